//! CLI commands.

mod find_bad;
mod find_orphans;
mod fix_bad;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use slurmfix_sources::{DbConfig, SlurmDbdSource, DEFAULT_DBD_CONF};

use crate::output::OutputFormat;

/// Find and fix problematic jobs on a Slurm cluster.
#[derive(Debug, Parser)]
#[command(name = "slurmfix")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table")]
    format: String,

    /// Path to slurmdbd.conf, the accounting database's credentials file.
    #[arg(
        long,
        global = true,
        env = "SLURMFIX_DBD_CONF",
        default_value = DEFAULT_DBD_CONF
    )]
    dbd_conf: PathBuf,

    /// Cluster name; selects the `{cluster}_job_table` accounting table.
    #[arg(long, global = true, env = "SLURMFIX_CLUSTER")]
    cluster: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Find unfinished accounting jobs the live queue no longer lists.
    #[command(name = "find-bad", alias = "find_bad")]
    FindBad(find_bad::FindBadCommand),

    /// Print statements that mark stale accounting jobs finished.
    #[command(name = "fix-bad", alias = "fix_bad")]
    FixBad(fix_bad::FixBadCommand),

    /// Find node processes with no matching live queue entry.
    #[command(name = "find-orphans", alias = "find_orphans")]
    FindOrphans(find_orphans::FindOrphansCommand),
}

impl Cli {
    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let format = match self.format.as_str() {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        };

        let ctx = CommandContext {
            format,
            dbd_conf: self.dbd_conf,
            cluster: self.cluster,
        };

        match self.command {
            Commands::FindBad(cmd) => cmd.run(ctx).await,
            Commands::FixBad(cmd) => cmd.run(ctx).await,
            Commands::FindOrphans(cmd) => cmd.run(ctx).await,
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub format: OutputFormat,
    pub dbd_conf: PathBuf,
    pub cluster: Option<String>,
}

impl CommandContext {
    /// Require a cluster name to be specified.
    pub fn require_cluster(&self) -> Result<&str> {
        self.cluster.as_deref().ok_or_else(|| {
            anyhow::anyhow!("No cluster name specified. Use --cluster or set SLURMFIX_CLUSTER.")
        })
    }

    /// Connect to the accounting database using slurmdbd.conf credentials.
    pub async fn accounting(&self) -> Result<SlurmDbdSource> {
        let cluster = self.require_cluster()?;
        let config = DbConfig::from_slurmdbd_conf(&self.dbd_conf)?;
        Ok(SlurmDbdSource::connect(&config, cluster).await?)
    }
}
