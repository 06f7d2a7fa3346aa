//! slurmfix - find and fix state drift between a Slurm cluster's live queue
//! and its accounting database.
//!
//! One-shot diagnostic: fetch snapshots, reconcile, report, exit. Nothing is
//! persisted and nothing is applied to the cluster; `fix-bad` only prints the
//! statements an operator would run.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Diagnostics go to stderr; stdout carries findings only.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
