//! Source error taxonomy.

use thiserror::Error;

/// Errors raised while fetching snapshots from external sources.
///
/// `Unavailable`, `Connect`, and `Query` are fatal for the run: reconciling
/// against incomplete data could suggest incorrect remediation.
/// `NodeUnreachable` is recoverable; the affected node is skipped.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A required data source cannot be reached.
    #[error("{source_name} unavailable: {reason}")]
    Unavailable { source_name: &'static str, reason: String },

    /// Failed to connect to the accounting database.
    #[error("failed to connect to accounting database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Accounting query failed.
    #[error("accounting query failed: {0}")]
    Query(#[source] sqlx::Error),

    /// One node's process listing could not be retrieved.
    #[error("node {node} unreachable: {reason}")]
    NodeUnreachable { node: String, reason: String },
}

impl SourceError {
    /// Returns true if the run can continue without this snapshot.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::NodeUnreachable { .. })
    }
}
