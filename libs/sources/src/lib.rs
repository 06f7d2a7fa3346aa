//! Data-source collaborators for slurmfix.
//!
//! Each external source the reconciliation engine consumes is a trait with
//! a production implementation and an in-memory one beside it:
//!
//! - [`QueueSource`]: the live queue listing (`squeue`) / [`StaticQueue`]
//! - [`AccountingSource`]: slurmdbd's MySQL store / [`StaticAccounting`]
//! - [`ProcessSource`]: per-node process tables over ssh / [`StaticProcesses`]
//! - [`NodeRoster`]: the cluster's node names (`sinfo`) / [`StaticRoster`]
//!
//! The engine itself never performs I/O; callers materialize snapshots
//! through these traits and hand them over as plain values. Static
//! implementations exist so the full find/fix flows can be exercised
//! without a cluster.

mod accounting;
mod config;
mod error;
pub mod hostlist;
mod process;
mod queue;
mod roster;

pub use accounting::{AccountingSource, SlurmDbdSource, StaticAccounting};
pub use config::{service_accounts, ConfigError, DbConfig, DEFAULT_DBD_CONF, DEFAULT_SERVICE_ACCOUNTS};
pub use error::SourceError;
pub use process::{ProcessSource, SshProcessSource, StaticProcesses};
pub use queue::{QueueSource, SqueueSource, StaticQueue};
pub use roster::{NodeRoster, SinfoRoster, StaticRoster};
