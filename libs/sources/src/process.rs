//! Node process source.
//!
//! Lists what is actually running on a compute node by invoking `ps` over
//! ssh. Key-based, non-interactive auth is assumed; an unreachable node is a
//! soft failure the caller can skip.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use slurmfix_reconcile::ProcessRecord;

use crate::error::SourceError;

/// Owner, pid, and command line without a header.
const PS_ARGS: &[&str] = &["ps", "-e", "--no-headers", "-o", "%U|%p|%a"];

/// Per-node process listings.
#[async_trait]
pub trait ProcessSource: Send + Sync {
    /// Processes currently running on one node.
    async fn node_processes(&self, node: &str) -> Result<Vec<ProcessRecord>, SourceError>;
}

/// Production process source that shells into nodes.
pub struct SshProcessSource {
    ssh_path: PathBuf,
    connect_timeout_secs: u64,
}

impl SshProcessSource {
    pub fn new() -> Self {
        Self {
            ssh_path: PathBuf::from("ssh"),
            connect_timeout_secs: 10,
        }
    }

    /// Use a specific ssh binary.
    #[must_use]
    pub fn with_path(ssh_path: impl Into<PathBuf>) -> Self {
        Self {
            ssh_path: ssh_path.into(),
            ..Self::new()
        }
    }

    #[must_use]
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

impl Default for SshProcessSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessSource for SshProcessSource {
    async fn node_processes(&self, node: &str) -> Result<Vec<ProcessRecord>, SourceError> {
        let unreachable = |reason: String| SourceError::NodeUnreachable {
            node: node.to_string(),
            reason,
        };

        let output = Command::new(&self.ssh_path)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.connect_timeout_secs))
            .arg(node)
            .args(PS_ARGS)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        if !output.status.success() {
            return Err(unreachable(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut processes = Vec::new();
        for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
            match parse_ps_line(node, line) {
                Some(process) => processes.push(process),
                None => warn!(node, line, "Dropping malformed ps line"),
            }
        }
        Ok(processes)
    }
}

/// Parse one `%U|%p|%a` line. The command field may itself contain `|`.
fn parse_ps_line(node: &str, line: &str) -> Option<ProcessRecord> {
    let mut parts = line.trim().trim_matches('"').splitn(3, '|');

    let owner = parts.next()?.trim();
    if owner.is_empty() {
        return None;
    }
    let pid: u32 = parts.next()?.trim().parse().ok()?;
    let command = parts.next()?.trim();

    Some(ProcessRecord {
        node: node.to_string(),
        owner: owner.to_string(),
        pid,
        command: command.to_string(),
    })
}

/// In-memory process source for tests and dev runs.
///
/// Nodes can be marked unreachable to exercise the soft-failure path.
pub struct StaticProcesses {
    nodes: BTreeMap<String, Vec<ProcessRecord>>,
    unreachable: Vec<String>,
}

impl StaticProcesses {
    pub fn new(nodes: BTreeMap<String, Vec<ProcessRecord>>) -> Self {
        Self {
            nodes,
            unreachable: Vec::new(),
        }
    }

    /// Mark a node as unreachable.
    #[must_use]
    pub fn with_unreachable(mut self, node: impl Into<String>) -> Self {
        self.unreachable.push(node.into());
        self
    }
}

#[async_trait]
impl ProcessSource for StaticProcesses {
    async fn node_processes(&self, node: &str) -> Result<Vec<ProcessRecord>, SourceError> {
        if self.unreachable.iter().any(|n| n == node) {
            return Err(SourceError::NodeUnreachable {
                node: node.to_string(),
                reason: "static source configured as unreachable".to_string(),
            });
        }
        Ok(self.nodes.get(node).cloned().unwrap_or_default())
    }
}
