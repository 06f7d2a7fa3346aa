//! Live queue source.
//!
//! Wraps `squeue` to snapshot the jobs the scheduler currently lists, with
//! owning user and expanded node assignment.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use slurmfix_reconcile::{JobId, JobRecord};

use crate::error::SourceError;
use crate::hostlist;

/// Job id, user, and node list without a header line.
const SQUEUE_FORMAT: &str = "%A|%u|%N";

/// The live queue listing.
#[async_trait]
pub trait QueueSource: Send + Sync {
    /// Snapshot of the jobs the queue currently lists.
    async fn jobs(&self) -> Result<Vec<JobRecord>, SourceError>;
}

/// Production queue source backed by `squeue`.
pub struct SqueueSource {
    squeue_path: PathBuf,
}

impl SqueueSource {
    pub fn new() -> Self {
        Self {
            squeue_path: PathBuf::from("squeue"),
        }
    }

    /// Use a specific squeue binary.
    #[must_use]
    pub fn with_path(squeue_path: impl Into<PathBuf>) -> Self {
        Self {
            squeue_path: squeue_path.into(),
        }
    }
}

impl Default for SqueueSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueSource for SqueueSource {
    async fn jobs(&self) -> Result<Vec<JobRecord>, SourceError> {
        let output = Command::new(&self.squeue_path)
            .args(["-h", "-o", SQUEUE_FORMAT])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SourceError::Unavailable {
                source_name: "squeue",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SourceError::Unavailable {
                source_name: "squeue",
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut jobs = Vec::new();
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            match parse_squeue_line(line) {
                Some(job) => jobs.push(job),
                None => warn!(line, "Dropping malformed squeue line"),
            }
        }
        Ok(jobs)
    }
}

/// Parse one `%A|%u|%N` line. Returns None when required fields are missing.
fn parse_squeue_line(line: &str) -> Option<JobRecord> {
    let mut parts = line.trim().splitn(3, '|');

    let job_id: JobId = parts.next()?.trim().trim_matches('"').parse().ok()?;
    let user = parts.next()?.trim();
    if user.is_empty() {
        return None;
    }

    let nodelist = parts.next().unwrap_or("").trim();
    let nodes = if nodelist.is_empty() || nodelist == "(null)" {
        // Pending jobs have no assignment yet.
        Vec::new()
    } else {
        hostlist::expand(nodelist).ok()?
    };

    Some(JobRecord::queue(job_id, user, nodes))
}

/// In-memory queue source for tests and dev runs.
pub struct StaticQueue {
    jobs: Vec<JobRecord>,
    fail: bool,
}

impl StaticQueue {
    pub fn new(jobs: Vec<JobRecord>) -> Self {
        Self { jobs, fail: false }
    }

    /// A queue source that cannot be reached.
    pub fn unavailable() -> Self {
        Self {
            jobs: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl QueueSource for StaticQueue {
    async fn jobs(&self) -> Result<Vec<JobRecord>, SourceError> {
        if self.fail {
            return Err(SourceError::Unavailable {
                source_name: "squeue",
                reason: "static source configured to fail".to_string(),
            });
        }
        Ok(self.jobs.clone())
    }
}
