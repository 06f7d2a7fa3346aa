//! find-orphans: node processes with no matching queue entry.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use clap::Args;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tabled::Tabled;
use tracing::warn;

use slurmfix_reconcile::{find_orphans, Finding, OrphanProcess};
use slurmfix_sources::{
    service_accounts, NodeRoster, ProcessSource, QueueSource, SinfoRoster, SourceError,
    SqueueSource, SshProcessSource,
};

use crate::output::{print_json, print_table, OutputFormat};

use super::CommandContext;

/// find-orphans command.
#[derive(Debug, Args)]
pub struct FindOrphansCommand {
    /// Additional service account to exclude (repeatable).
    #[arg(long = "service-account", value_name = "USER")]
    service_accounts: Vec<String>,

    /// Maximum concurrent node queries.
    #[arg(long, default_value = "16")]
    fanout: usize,

    /// Ssh connect timeout per node, in seconds.
    #[arg(long, default_value = "10")]
    connect_timeout: u64,
}

impl FindOrphansCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let queue = SqueueSource::new();
        let roster = SinfoRoster::new();
        let processes = SshProcessSource::new().connect_timeout_secs(self.connect_timeout);
        let accounts = service_accounts(&self.service_accounts);

        let report = collect_orphans(&queue, &roster, &processes, &accounts, self.fanout).await?;
        print_orphans(&report, ctx.format);
        Ok(())
    }
}

/// Everything one orphan scan produced.
pub(crate) struct OrphanReport {
    pub findings: Vec<OrphanProcess>,
    /// Nodes whose process listing could not be retrieved.
    pub skipped_nodes: Vec<String>,
}

/// Snapshot the queue and every roster node's processes, then reconcile.
///
/// Per-node listings run concurrently up to `fanout`. An unreachable node is
/// skipped with a warning; the scan still succeeds and reports the rest.
pub(crate) async fn collect_orphans(
    queue: &dyn QueueSource,
    roster: &dyn NodeRoster,
    processes: &dyn ProcessSource,
    service_accounts: &BTreeSet<String>,
    fanout: usize,
) -> Result<OrphanReport, SourceError> {
    let (queue_jobs, nodes) = tokio::try_join!(queue.jobs(), roster.nodes())?;

    let listings: Vec<_> = stream::iter(nodes)
        .map(|node| async move {
            let listing = processes.node_processes(&node).await;
            (node, listing)
        })
        .buffer_unordered(fanout.max(1))
        .collect()
        .await;

    let mut node_processes = BTreeMap::new();
    let mut skipped_nodes = Vec::new();
    for (node, listing) in listings {
        match listing {
            Ok(records) => {
                node_processes.insert(node, records);
            }
            Err(e) => {
                warn!(%node, error = %e, "Skipping unreachable node");
                skipped_nodes.push(node);
            }
        }
    }
    skipped_nodes.sort();

    Ok(OrphanReport {
        findings: find_orphans(&queue_jobs, &node_processes, service_accounts),
        skipped_nodes,
    })
}

#[derive(Debug, Tabled)]
struct OrphanRow {
    #[tabled(rename = "NODE")]
    node: String,

    #[tabled(rename = "USER")]
    owner: String,

    #[tabled(rename = "PID")]
    pid: u32,

    #[tabled(rename = "CMD")]
    command: String,
}

impl From<&OrphanProcess> for OrphanRow {
    fn from(finding: &OrphanProcess) -> Self {
        Self {
            node: finding.node.clone(),
            owner: finding.owner.clone(),
            pid: finding.pid,
            command: finding.command.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OrphanReportDoc {
    findings: Vec<Finding>,
    skipped_nodes: Vec<String>,
}

fn print_orphans(report: &OrphanReport, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let rows: Vec<OrphanRow> = report.findings.iter().map(OrphanRow::from).collect();
            print_table(&rows);
        }
        OutputFormat::Json => {
            let doc = OrphanReportDoc {
                findings: report
                    .findings
                    .iter()
                    .cloned()
                    .map(Finding::from)
                    .collect(),
                skipped_nodes: report.skipped_nodes.clone(),
            };
            print_json(&doc);
        }
    }
}
