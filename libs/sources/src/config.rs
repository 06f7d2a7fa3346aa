//! Accounting credentials and service-account configuration.
//!
//! The accounting database's connection parameters come from the same file
//! slurmdbd itself reads (`slurmdbd.conf`), so the tool never carries
//! credentials of its own.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Default slurmdbd.conf location.
pub const DEFAULT_DBD_CONF: &str = "/etc/slurm/slurmdbd.conf";

/// Accounts expected to run node-management processes outside the scheduler.
///
/// Processes owned by these are never orphan candidates.
pub const DEFAULT_SERVICE_ACCOUNTS: &[&str] = &[
    "root", "postfix", "ntp", "rpc", "rpcuser", "dbus", "munge", "ganglia", "nscd", "68",
];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Could not read the config file.
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required key is absent.
    #[error("{path} is missing required key {key}")]
    MissingKey { path: PathBuf, key: &'static str },

    /// A key's value does not parse.
    #[error("invalid {key} value '{value}' in {path}")]
    InvalidValue {
        path: PathBuf,
        key: &'static str,
        value: String,
    },
}

/// Accounting database connection parameters.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: Option<u16>,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl DbConfig {
    /// Load connection parameters from a slurmdbd.conf file.
    ///
    /// Reads the `Storage*` keys slurmdbd uses for its own store. `StoragePort`
    /// is optional; the driver default applies when absent.
    pub fn from_slurmdbd_conf(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = parse_kv(&contents);

        let require = |key: &'static str| -> Result<String, ConfigError> {
            settings
                .get(key)
                .cloned()
                .ok_or_else(|| ConfigError::MissingKey {
                    path: path.to_path_buf(),
                    key,
                })
        };

        let port = match settings.get("StoragePort") {
            None => None,
            Some(value) if value.is_empty() => None,
            Some(value) => Some(value.parse().map_err(|_| ConfigError::InvalidValue {
                path: path.to_path_buf(),
                key: "StoragePort",
                value: value.clone(),
            })?),
        };

        Ok(Self {
            host: require("StorageHost")?,
            port,
            user: require("StorageUser")?,
            password: require("StoragePass")?,
            database: require("StorageLoc")?,
        })
    }
}

/// Parse `Key=Value` lines, skipping blanks and `#` comments.
///
/// Values keep any embedded `=` (passwords).
fn parse_kv(contents: &str) -> HashMap<String, String> {
    let mut settings = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            settings.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    settings
}

/// The built-in service accounts plus any operator-supplied extras.
#[must_use]
pub fn service_accounts(extra: &[String]) -> BTreeSet<String> {
    DEFAULT_SERVICE_ACCOUNTS
        .iter()
        .map(|account| account.to_string())
        .chain(extra.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_conf(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parses_storage_keys() {
        let file = write_conf(
            "# slurmdbd configuration\n\
             StorageHost=db.cluster\n\
             StoragePort=3306\n\
             StorageUser=slurm\n\
             StoragePass=s3cret=with=equals\n\
             StorageLoc=slurm_acct_db\n",
        );

        let config = DbConfig::from_slurmdbd_conf(file.path()).unwrap();
        assert_eq!(config.host, "db.cluster");
        assert_eq!(config.port, Some(3306));
        assert_eq!(config.user, "slurm");
        assert_eq!(config.password, "s3cret=with=equals");
        assert_eq!(config.database, "slurm_acct_db");
    }

    #[test]
    fn port_is_optional() {
        let file = write_conf(
            "StorageHost=db\nStorageUser=slurm\nStoragePass=x\nStorageLoc=acct\n",
        );
        let config = DbConfig::from_slurmdbd_conf(file.path()).unwrap();
        assert_eq!(config.port, None);
    }

    #[test]
    fn missing_key_is_an_error() {
        let file = write_conf("StorageHost=db\n");
        let err = DbConfig::from_slurmdbd_conf(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }

    #[test]
    fn bad_port_is_an_error() {
        let file = write_conf(
            "StorageHost=db\nStoragePort=lots\nStorageUser=u\nStoragePass=p\nStorageLoc=d\n",
        );
        let err = DbConfig::from_slurmdbd_conf(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn comments_and_blank_lines_are_ignored() {
        let parsed = parse_kv("# comment\n\nKey=Value\n  # indented comment\n");
        assert_eq!(parsed.get("Key").map(String::as_str), Some("Value"));
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn extra_service_accounts_extend_the_defaults() {
        let accounts = service_accounts(&["nagios".to_string()]);
        assert!(accounts.contains("root"));
        assert!(accounts.contains("munge"));
        assert!(accounts.contains("nagios"));
    }
}
