//! Cluster node roster.
//!
//! Names the compute nodes worth scanning for orphans, from `sinfo`'s
//! per-node listing. Composite names are expanded and deduplicated (a node
//! appears once per partition it belongs to).

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;

use crate::error::SourceError;
use crate::hostlist;

/// The set of candidate compute nodes.
#[async_trait]
pub trait NodeRoster: Send + Sync {
    /// Node names, deduplicated, in listing order.
    async fn nodes(&self) -> Result<Vec<String>, SourceError>;
}

/// Production roster backed by `sinfo`.
pub struct SinfoRoster {
    sinfo_path: PathBuf,
}

impl SinfoRoster {
    pub fn new() -> Self {
        Self {
            sinfo_path: PathBuf::from("sinfo"),
        }
    }

    /// Use a specific sinfo binary.
    #[must_use]
    pub fn with_path(sinfo_path: impl Into<PathBuf>) -> Self {
        Self {
            sinfo_path: sinfo_path.into(),
        }
    }
}

impl Default for SinfoRoster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NodeRoster for SinfoRoster {
    async fn nodes(&self) -> Result<Vec<String>, SourceError> {
        let output = Command::new(&self.sinfo_path)
            .args(["-h", "-N", "-o", "%N"])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SourceError::Unavailable {
                source_name: "sinfo",
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(SourceError::Unavailable {
                source_name: "sinfo",
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(collect_nodes(stdout.lines()))
    }
}

/// Expand and deduplicate node name lines, keeping first-seen order.
fn collect_nodes<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match hostlist::expand(line) {
            Ok(names) => {
                for name in names {
                    if seen.insert(name.clone()) {
                        nodes.push(name);
                    }
                }
            }
            Err(e) => warn!(line, error = %e, "Dropping malformed node name"),
        }
    }
    nodes
}

/// In-memory roster for tests and dev runs.
pub struct StaticRoster {
    nodes: Vec<String>,
}

impl StaticRoster {
    pub fn new(nodes: Vec<String>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeRoster for StaticRoster {
    async fn nodes(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.nodes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_and_dedups_listing_lines() {
        let lines = ["gpu[01-02]", "gpu01", "login1", ""];
        let nodes = collect_nodes(lines.into_iter());
        assert_eq!(nodes, vec!["gpu01", "gpu02", "login1"]);
    }

    #[test]
    fn skips_malformed_lines() {
        let lines = ["n[3-1]", "n5"];
        let nodes = collect_nodes(lines.into_iter());
        assert_eq!(nodes, vec!["n5"]);
    }
}
