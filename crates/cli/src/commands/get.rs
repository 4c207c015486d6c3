//! get command - Download objects
//!
//! A single key lands in `TARGET/<basename>`. A prefix ending with the
//! delimiter is downloaded recursively, keeping its last segment:
//! `get test/util/ out` writes `out/util/...`.

use std::path::PathBuf;

use clap::Args;

use super::{CommandContext, TreeArgs, fail};
use crate::exit_code::ExitCode;

/// Download an object or a prefix
#[derive(Args, Debug)]
pub struct GetArgs {
    /// Object key, or a prefix ending with the delimiter
    pub key: String,

    /// Local destination directory
    #[arg(default_value = ".")]
    pub target: PathBuf,

    #[command(flatten)]
    pub tree: TreeArgs,

    /// Download this version of a single key
    #[arg(long)]
    pub version_id: Option<String>,
}

/// Execute the get command
pub async fn execute(args: GetArgs, ctx: &CommandContext) -> ExitCode {
    let formatter = ctx.formatter();

    let cfg = s3tree_core::OperationConfig {
        version_id: args.version_id,
        ..ctx.operation(&args.tree)
    };

    let engine = match ctx.engine(formatter.clone(), cfg.dry_run).await {
        Ok(engine) => engine,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    match engine.get(&args.target, &args.key, &args.key, &cfg).await {
        Ok(stats) => {
            tracing::debug!(objects = stats.objects, "Download finished");
            ExitCode::Success
        }
        Err(e) => fail(&formatter, "Download failed", &e),
    }
}
