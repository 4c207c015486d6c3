//! du command - Storage usage of a bucket or prefix

use clap::Args;
use s3tree_core::OperationConfig;
use s3tree_core::config::DEFAULT_CONCURRENCY;

use super::{CommandContext, fail};
use crate::exit_code::ExitCode;

/// Show storage used below a prefix
#[derive(Args, Debug)]
pub struct DuArgs {
    /// Key prefix (default: whole bucket)
    #[arg(default_value = "")]
    pub prefix: String,

    /// Multipart uploads whose parts are listed at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,
}

/// Execute the du command
pub async fn execute(args: DuArgs, ctx: &CommandContext) -> ExitCode {
    let formatter = ctx.formatter();

    let cfg = OperationConfig {
        concurrency: args.concurrency,
        ..OperationConfig::new(ctx.global.bucket())
    };

    let engine = match ctx.engine(formatter.clone(), false).await {
        Ok(engine) => engine,
        Err(e) => return fail(&formatter, "Failed to create S3 client", &e),
    };

    match engine.bucket_size(&cfg, &args.prefix).await {
        Ok(_) => ExitCode::Success,
        Err(e) => fail(&formatter, "Size scan failed", &e),
    }
}
