//! rm command - Remove objects
//!
//! A key ending with the delimiter removes everything below it. Removing the
//! whole bucket (`/`) requires `--force`.

use clap::Args;

use super::{CommandContext, TreeArgs, fail};
use crate::exit_code::ExitCode;

/// Remove an object or a prefix
#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object key, or a prefix ending with the delimiter
    pub key: String,

    #[command(flatten)]
    pub tree: TreeArgs,

    /// Allow removing the whole bucket
    #[arg(long)]
    pub force: bool,

    /// Remove this version of a single key
    #[arg(long)]
    pub version_id: Option<String>,

    /// Bypass governance-mode object lock retention
    #[arg(long)]
    pub bypass_governance: bool,
}

/// Execute the rm command
pub async fn execute(args: RmArgs, ctx: &CommandContext) -> ExitCode {
    let formatter = ctx.formatter();

    let cfg = s3tree_core::OperationConfig {
        force: args.force,
        version_id: args.version_id,
        bypass_governance: args.bypass_governance,
        ..ctx.operation(&args.tree)
    };

    if cfg.dry_run {
        formatter.warning("dry-run: nothing will be deleted");
    }

    let engine = match ctx.engine(formatter.clone(), cfg.dry_run).await {
        Ok(engine) => engine,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    match engine.delete(&args.key, &cfg).await {
        Ok(stats) => {
            if !cfg.dry_run {
                formatter.success(&format!("Removed {} object(s)", stats.objects));
            }
            ExitCode::Success
        }
        Err(e) => fail(&formatter, "Remove failed", &e),
    }
}
