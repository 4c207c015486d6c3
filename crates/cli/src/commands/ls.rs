//! ls command - List objects
//!
//! Without `--recursive` only one level below the prefix is shown, with
//! common prefixes printed as `PREFIX` lines.

use clap::Args;
use s3tree_core::config::DEFAULT_DELIMITER;

use super::{CommandContext, fail};
use crate::exit_code::ExitCode;

/// List objects
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Key prefix to list (default: bucket root)
    #[arg(default_value = "")]
    pub prefix: String,

    /// Expand common prefixes and list every object below the prefix
    #[arg(short, long)]
    pub recursive: bool,

    /// Key delimiter of the virtual hierarchy
    #[arg(long, default_value = DEFAULT_DELIMITER)]
    pub delimiter: String,
}

/// Execute the ls command
pub async fn execute(args: LsArgs, ctx: &CommandContext) -> ExitCode {
    let formatter = ctx.formatter();

    let engine = match ctx.engine(formatter.clone(), false).await {
        Ok(engine) => engine,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    let result = engine
        .list(
            &ctx.global.bucket(),
            &args.prefix,
            &args.prefix,
            &args.delimiter,
            args.recursive,
        )
        .await;

    match result {
        Ok(stats) => {
            tracing::debug!(
                objects = stats.objects,
                prefixes = stats.prefixes,
                "Listing finished"
            );
            ExitCode::Success
        }
        Err(e) => fail(&formatter, "Listing failed", &e),
    }
}
