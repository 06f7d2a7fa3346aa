//! fix-bad: repair statements for stale accounting jobs.

use anyhow::Result;
use clap::Args;
use tracing::info;

use slurmfix_reconcile::{build_repair_statements, RepairPolicy, TerminalState};
use slurmfix_sources::SqueueSource;

use super::find_bad::collect_stale;
use super::CommandContext;

/// fix-bad command.
#[derive(Debug, Args)]
pub struct FixBadCommand {
    /// Terminal state stale jobs are transitioned to (cancelled or failed).
    #[arg(long, default_value = "failed")]
    terminal_state: TerminalState,
}

impl FixBadCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let policy = RepairPolicy {
            cluster: ctx.require_cluster()?.to_string(),
            terminal_state: self.terminal_state,
        };

        let queue = SqueueSource::new();
        let accounting = ctx.accounting().await?;
        let findings = collect_stale(&queue, &accounting).await?;

        let statements = build_repair_statements(&findings, &policy);
        info!(count = statements.len(), "Stale jobs to repair");

        // Statement text only on stdout, so the output pastes straight into
        // the database's administrative client. Nothing is applied here.
        for statement in &statements {
            println!("{statement}");
        }
        Ok(())
    }
}
