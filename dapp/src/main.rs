//! Dapp - resolve Dappfiles and report stale build stages

use clap::Parser;
use dapp::Cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let default_filter = if cli.global.verbose {
        "dapp=debug,convenient_dappfile=debug,convenient_stage=debug"
    } else {
        "dapp=info,convenient_dappfile=info,convenient_stage=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    dapp::run(cli)
}
