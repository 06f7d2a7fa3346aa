//! find-bad: stale accounting jobs.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use slurmfix_reconcile::{find_stale, Finding, StaleAccountingJob};
use slurmfix_sources::{AccountingSource, QueueSource, SourceError, SqueueSource};

use crate::output::{dash, print_json, print_table, OutputFormat};

use super::CommandContext;

/// find-bad command.
#[derive(Debug, Args)]
pub struct FindBadCommand {}

impl FindBadCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let queue = SqueueSource::new();
        let accounting = ctx.accounting().await?;

        let findings = collect_stale(&queue, &accounting).await?;
        print_stale(&findings, ctx.format);
        Ok(())
    }
}

/// Snapshot both sources and reconcile.
///
/// The two fetches run concurrently so the snapshots sit close together in
/// time; either failure aborts the run before anything is printed.
pub(crate) async fn collect_stale(
    queue: &dyn QueueSource,
    accounting: &dyn AccountingSource,
) -> Result<Vec<StaleAccountingJob>, SourceError> {
    let (queue_jobs, acct_jobs) = tokio::try_join!(queue.jobs(), accounting.unfinished_jobs())?;
    Ok(find_stale(&queue_jobs, &acct_jobs))
}

#[derive(Debug, Tabled)]
struct StaleJobRow {
    #[tabled(rename = "JOBID")]
    job_id: String,

    #[tabled(rename = "STARTED")]
    started: String,

    #[tabled(rename = "ACCOUNT")]
    account: String,

    #[tabled(rename = "USERID")]
    uid: String,

    #[tabled(rename = "STATE")]
    state: String,

    #[tabled(rename = "NODES")]
    nodes: String,

    #[tabled(rename = "JOB NAME")]
    job_name: String,
}

impl From<&StaleAccountingJob> for StaleJobRow {
    fn from(finding: &StaleAccountingJob) -> Self {
        Self {
            job_id: finding.job_id.to_string(),
            started: dash(
                finding
                    .started
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            ),
            account: dash(finding.bank_account.clone()),
            uid: dash(finding.uid.map(|uid| uid.to_string())),
            state: finding.state.to_string(),
            nodes: if finding.nodes.is_empty() {
                "-".to_string()
            } else {
                finding.nodes.join(",")
            },
            job_name: dash(finding.job_name.clone()),
        }
    }
}

#[derive(Debug, Serialize)]
struct StaleReportDoc {
    findings: Vec<Finding>,
}

fn print_stale(findings: &[StaleAccountingJob], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let rows: Vec<StaleJobRow> = findings.iter().map(StaleJobRow::from).collect();
            print_table(&rows);
        }
        OutputFormat::Json => {
            let doc = StaleReportDoc {
                findings: findings.iter().cloned().map(Finding::from).collect(),
            };
            print_json(&doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use slurmfix_reconcile::{JobId, JobRecord, JobState, RecordSource};
    use slurmfix_sources::{StaticAccounting, StaticQueue};

    fn acct_job(id: u64, node: &str, user: &str, state: JobState) -> JobRecord {
        JobRecord {
            job_id: JobId::new(id),
            nodes: vec![node.to_string()],
            user: user.to_string(),
            state,
            source: RecordSource::Accounting,
            job_name: Some("work".to_string()),
            bank_account: Some(user.to_string()),
            uid: Some(1000),
            started: None,
        }
    }

    #[tokio::test]
    async fn reports_accounting_jobs_missing_from_queue() {
        let queue = StaticQueue::new(vec![JobRecord::queue(
            JobId::new(10),
            "alice",
            vec!["n1".to_string()],
        )]);
        let accounting = StaticAccounting::new(vec![
            acct_job(10, "n1", "alice", JobState::Running),
            acct_job(11, "n2", "bob", JobState::Running),
        ]);

        let findings = collect_stale(&queue, &accounting).await.unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].job_id, JobId::new(11));
    }

    #[tokio::test]
    async fn unreachable_accounting_fails_the_run() {
        let queue = StaticQueue::new(vec![]);
        let accounting = StaticAccounting::unavailable();

        let result = collect_stale(&queue, &accounting).await;
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
    }

    #[tokio::test]
    async fn unreachable_queue_fails_the_run() {
        let queue = StaticQueue::unavailable();
        let accounting = StaticAccounting::new(vec![]);

        let result = collect_stale(&queue, &accounting).await;
        assert!(matches!(result, Err(SourceError::Unavailable { .. })));
    }

    #[test]
    fn rows_render_missing_fields_as_dashes() {
        let finding = StaleAccountingJob {
            job_id: JobId::new(7),
            nodes: vec![],
            state: JobState::Pending,
            job_name: None,
            bank_account: None,
            uid: None,
            started: None,
        };

        let row = StaleJobRow::from(&finding);
        assert_eq!(row.job_id, "7");
        assert_eq!(row.started, "-");
        assert_eq!(row.nodes, "-");
        assert_eq!(row.state, "PENDING");
    }
}
