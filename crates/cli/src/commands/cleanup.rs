//! cleanup command - Empty a versioned bucket
//!
//! Deletes every object version and delete marker, then aborts every
//! incomplete multipart upload.

use clap::Args;
use s3tree_core::config::DEFAULT_CONCURRENCY;
use s3tree_core::{CleanupConfig, OperationConfig};

use super::{CommandContext, fail};
use crate::exit_code::ExitCode;

/// Delete all object versions and/or abort all multipart uploads
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Delete every object version and delete marker
    #[arg(long)]
    pub object_versions: bool,

    /// Abort every incomplete multipart upload
    #[arg(long)]
    pub multiparts: bool,

    /// Required unless --dry-run
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Bypass governance-mode object lock retention
    #[arg(long)]
    pub bypass_governance: bool,
}

/// Execute the cleanup command
pub async fn execute(args: CleanupArgs, ctx: &CommandContext) -> ExitCode {
    let formatter = ctx.formatter();

    let cfg = CleanupConfig {
        operation: OperationConfig {
            concurrency: args.concurrency,
            dry_run: args.dry_run,
            force: args.force,
            bypass_governance: args.bypass_governance,
            ..OperationConfig::new(ctx.global.bucket())
        },
        object_versions: args.object_versions,
        multiparts: args.multiparts,
    };

    let engine = match ctx.engine(formatter.clone(), args.dry_run).await {
        Ok(engine) => engine,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    match engine.cleanup(&cfg).await {
        Ok(summary) => {
            let verb = if args.dry_run { "Would remove" } else { "Removed" };
            formatter.success(&format!(
                "{verb} {} version(s) and {} multipart upload(s)",
                summary.versions, summary.uploads
            ));
            ExitCode::Success
        }
        Err(e) => fail(&formatter, "Cleanup failed", &e),
    }
}
