//! Queue/accounting reconciliation primitives.
//!
//! This library holds the pure comparison logic between the three job-state
//! sources of a Slurm cluster:
//!
//! - **Queue**: the scheduler's live view of running/pending jobs (authoritative
//!   for "is this job actually alive").
//! - **Accounting**: the slurmdbd database's view of unfinished jobs
//!   (authoritative only for "what the system of record believes").
//! - **Node processes**: what is actually executing on compute nodes.
//!
//! Disagreement between the sources is exactly what this library surfaces,
//! as [`StaleAccountingJob`] and [`OrphanProcess`] findings.
//!
//! # Invariants
//!
//! - All operations are pure functions of their snapshot inputs; no I/O,
//!   no retries, no shared state.
//! - Decisions are deterministic given the same inputs.
//! - Comparisons are keyed by job id (stale check) and by `(node, owner)`
//!   (orphan check), never by record identity.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Numeric Slurm job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// Creates a JobId from the raw scheduler id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw numeric id.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Job state as recorded by a source.
///
/// The accounting schema stores states numerically; 0 and 1 are pending and
/// running, everything else that the unfinished-jobs query returns is kept
/// verbatim rather than guessed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    /// Any other state the accounting source still considers unfinished.
    OtherUnfinished(u32),
}

impl JobState {
    /// Map a raw accounting state code to a [`JobState`].
    #[must_use]
    pub fn from_raw(code: u32) -> Self {
        match code {
            0 => Self::Pending,
            1 => Self::Running,
            other => Self::OtherUnfinished(other),
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::OtherUnfinished(code) => write!(f, "UNFINISHED({code})"),
        }
    }
}

/// Which source a [`JobRecord`] snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Queue,
    Accounting,
}

/// One job as seen by a single source at snapshot time.
///
/// Records are immutable snapshot values: created fresh per invocation,
/// compared, discarded. The `job_name`/`bank_account`/`uid`/`started` fields
/// are display-only context that the accounting source can provide; the queue
/// source leaves them empty.
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,

    /// Expanded host list; empty for jobs that have not started.
    pub nodes: Vec<String>,

    /// Owning account (the username processes run under).
    pub user: String,

    pub state: JobState,

    pub source: RecordSource,

    pub job_name: Option<String>,

    /// Bank account the job is charged to.
    pub bank_account: Option<String>,

    /// Numeric uid recorded by accounting.
    pub uid: Option<u32>,

    pub started: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A record as the live queue reports it: id, owner, and node assignment.
    #[must_use]
    pub fn queue(job_id: JobId, user: impl Into<String>, nodes: Vec<String>) -> Self {
        Self {
            job_id,
            nodes,
            user: user.into(),
            state: JobState::Running,
            source: RecordSource::Queue,
            job_name: None,
            bank_account: None,
            uid: None,
            started: None,
        }
    }
}

/// One process running on a compute node.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    pub node: String,

    /// Account the process runs under.
    pub owner: String,

    pub pid: u32,

    pub command: String,
}

/// A job the accounting database believes is unfinished while the live queue
/// no longer lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleAccountingJob {
    pub job_id: JobId,

    /// Last-known node assignment; empty when the job never started.
    pub nodes: Vec<String>,

    /// State the accounting database still records.
    pub state: JobState,

    pub job_name: Option<String>,

    pub bank_account: Option<String>,

    pub uid: Option<u32>,

    pub started: Option<DateTime<Utc>>,
}

impl From<&JobRecord> for StaleAccountingJob {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            nodes: record.nodes.clone(),
            state: record.state,
            job_name: record.job_name.clone(),
            bank_account: record.bank_account.clone(),
            uid: record.uid,
            started: record.started,
        }
    }
}

/// A process running on a node under a non-service account with no matching
/// live queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanProcess {
    pub node: String,
    pub owner: String,
    pub pid: u32,
    pub command: String,
}

/// Every finding class the engine can emit.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Finding {
    StaleAccountingJob(StaleAccountingJob),
    OrphanProcess(OrphanProcess),
}

impl From<StaleAccountingJob> for Finding {
    fn from(finding: StaleAccountingJob) -> Self {
        Self::StaleAccountingJob(finding)
    }
}

impl From<OrphanProcess> for Finding {
    fn from(finding: OrphanProcess) -> Self {
        Self::OrphanProcess(finding)
    }
}

/// Terminal state a repair statement transitions a stale job to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Cancelled,
    Failed,
}

impl TerminalState {
    /// Numeric code in the accounting schema.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Cancelled => 4,
            Self::Failed => 5,
        }
    }
}

/// Error parsing a terminal state name.
#[derive(Debug, Error)]
#[error("unknown terminal state '{0}', expected 'cancelled' or 'failed'")]
pub struct ParseTerminalStateError(String);

impl FromStr for TerminalState {
    type Err = ParseTerminalStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cancelled" => Ok(Self::Cancelled),
            "failed" => Ok(Self::Failed),
            other => Err(ParseTerminalStateError(other.to_string())),
        }
    }
}

impl fmt::Display for TerminalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// How repair statements are rendered for a given cluster.
#[derive(Debug, Clone)]
pub struct RepairPolicy {
    /// Cluster name; selects the `{cluster}_job_table` accounting table.
    pub cluster: String,

    /// Terminal state stale jobs are transitioned to.
    pub terminal_state: TerminalState,
}

/// One formatted state-repair statement for the accounting database.
///
/// Producing a statement is side-effect free; applying it is the operator's
/// (or an external executor's) job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepairStatement {
    pub job_id: JobId,
    pub sql: String,
}

impl fmt::Display for RepairStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)
    }
}

/// Find accounting jobs the live queue no longer lists.
///
/// Computes `{ j in acct_jobs : j.job_id not in ids(queue_jobs) }`. A job id
/// present in both inputs is never reported, regardless of state or node
/// disagreement. The accounting input order is preserved in the output.
///
/// Both inputs are snapshots the caller took close together in time; skew
/// between them is the caller's concern.
#[must_use]
pub fn find_stale(queue_jobs: &[JobRecord], acct_jobs: &[JobRecord]) -> Vec<StaleAccountingJob> {
    let live: HashSet<JobId> = queue_jobs.iter().map(|j| j.job_id).collect();

    acct_jobs
        .iter()
        .filter(|job| !live.contains(&job.job_id))
        .map(StaleAccountingJob::from)
        .collect()
}

/// Render one repair statement per stale finding, in input order.
///
/// The statement shape matches what slurmdbd administrators apply by hand:
/// the job's state column moves to the configured terminal code and
/// `time_end` is set just past `time_start` so the record stops matching the
/// unfinished-jobs query.
#[must_use]
pub fn build_repair_statements(
    findings: &[StaleAccountingJob],
    policy: &RepairPolicy,
) -> Vec<RepairStatement> {
    findings
        .iter()
        .map(|finding| RepairStatement {
            job_id: finding.job_id,
            sql: format!(
                "UPDATE {}_job_table SET state = {}, time_end = time_start + 1 WHERE id_job = {};",
                policy.cluster,
                policy.terminal_state.code(),
                finding.job_id
            ),
        })
        .collect()
}

/// Find processes on compute nodes with no matching live queue entry.
///
/// `service_accounts` is the allow-list of accounts expected to run
/// node-management processes outside the scheduler; their processes are
/// excluded before the queue match is ever consulted. A node absent from
/// `node_processes` contributes nothing; a node absent from the queue flags
/// every one of its non-service processes.
#[must_use]
pub fn find_orphans(
    queue_jobs: &[JobRecord],
    node_processes: &BTreeMap<String, Vec<ProcessRecord>>,
    service_accounts: &BTreeSet<String>,
) -> Vec<OrphanProcess> {
    let claimed: HashSet<(&str, &str)> = queue_jobs
        .iter()
        .flat_map(|job| {
            job.nodes
                .iter()
                .map(move |node| (node.as_str(), job.user.as_str()))
        })
        .collect();

    let mut findings = Vec::new();
    for (node, processes) in node_processes {
        for process in processes {
            if service_accounts.contains(&process.owner) {
                continue;
            }
            if claimed.contains(&(node.as_str(), process.owner.as_str())) {
                continue;
            }
            findings.push(OrphanProcess {
                node: node.clone(),
                owner: process.owner.clone(),
                pid: process.pid,
                command: process.command.clone(),
            });
        }
    }
    findings
}
