//! s3tree - recursive list, delete and download for S3-compatible storage

mod commands;
mod exit_code;
mod logging;
mod output;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use commands::{CommandContext, Commands, GlobalArgs};
use exit_code::ExitCode;
use output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "s3tree", version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    /// Print one JSON object per line
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> anyhow::Result<std::process::ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;

    let code = runtime.block_on(run(cli));
    Ok(code.into())
}

async fn run(cli: Cli) -> ExitCode {
    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let ctx = CommandContext {
        global: cli.global,
        output: OutputConfig {
            json: cli.json,
            no_color: cli.no_color,
            quiet: cli.quiet,
        },
        cancel,
    };

    match cli.command {
        Commands::Ls(args) => commands::ls::execute(args, &ctx).await,
        Commands::Rm(args) => commands::rm::execute(args, &ctx).await,
        Commands::Get(args) => commands::get::execute(args, &ctx).await,
        Commands::Cleanup(args) => commands::cleanup::execute(args, &ctx).await,
        Commands::Du(args) => commands::du::execute(args, &ctx).await,
        Commands::Profiles => commands::profiles::execute(&ctx),
    }
}

/// Cancel all work on the first Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupted, stopping");
                cancel.cancel();
            }
            Err(e) => tracing::debug!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });
}
