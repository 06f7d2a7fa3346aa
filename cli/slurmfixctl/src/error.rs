//! Error handling and display for the CLI.

use colored::Colorize;

use slurmfix_sources::{ConfigError, SourceError};

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    // Provide hints for the common failure modes.
    if let Some(source_err) = err.downcast_ref::<SourceError>() {
        match source_err {
            SourceError::Unavailable { source_name, .. } => {
                eprintln!(
                    "\n{}",
                    format!("Hint: Check that `{source_name}` is on PATH and the cluster is responding.")
                        .yellow()
                );
            }
            SourceError::Connect(_) | SourceError::Query(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Check the Storage* settings in slurmdbd.conf and database reachability."
                        .yellow()
                );
            }
            SourceError::NodeUnreachable { .. } => {}
        }
    } else if err.downcast_ref::<ConfigError>().is_some() {
        eprintln!(
            "\n{}",
            "Hint: Pass --dbd-conf or set SLURMFIX_DBD_CONF to a readable slurmdbd.conf."
                .yellow()
        );
    }
}
