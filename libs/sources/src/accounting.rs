//! Accounting database source.
//!
//! Queries slurmdbd's MySQL store for jobs it still considers unfinished:
//! state below the completed range or no recorded end time. The per-cluster
//! `{cluster}_job_table` naming follows the slurmdbd schema.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::Row;
use tracing::warn;

use slurmfix_reconcile::{JobId, JobRecord, JobState, RecordSource};

use crate::config::DbConfig;
use crate::error::SourceError;
use crate::hostlist;

/// The accounting database's view of unfinished jobs.
#[async_trait]
pub trait AccountingSource: Send + Sync {
    /// Jobs whose recorded state is still unfinished.
    async fn unfinished_jobs(&self) -> Result<Vec<JobRecord>, SourceError>;
}

/// Production accounting source backed by slurmdbd's MySQL store.
pub struct SlurmDbdSource {
    pool: MySqlPool,
    table: String,
}

impl SlurmDbdSource {
    /// Connect using credentials from slurmdbd.conf.
    pub async fn connect(config: &DbConfig, cluster: &str) -> Result<Self, SourceError> {
        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        if let Some(port) = config.port {
            options = options.port(port);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(SourceError::Connect)?;

        Ok(Self {
            pool,
            table: format!("{cluster}_job_table"),
        })
    }
}

#[async_trait]
impl AccountingSource for SlurmDbdSource {
    async fn unfinished_jobs(&self) -> Result<Vec<JobRecord>, SourceError> {
        // Table names cannot be bound parameters; the cluster name comes from
        // operator configuration, not user input.
        let sql = format!(
            "SELECT id_job, job_name, account, id_user, state, time_start, nodelist \
             FROM {} WHERE state < 3 OR time_end = 0 ORDER BY time_start",
            self.table
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(SourceError::Query)?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in &rows {
            match job_from_row(row) {
                Ok(job) => jobs.push(job),
                Err(reason) => warn!(%reason, "Dropping malformed accounting row"),
            }
        }
        Ok(jobs)
    }
}

/// Map one accounting row to a [`JobRecord`]; the error names the bad column.
fn job_from_row(row: &MySqlRow) -> Result<JobRecord, String> {
    let job_id: u64 = row
        .try_get("id_job")
        .map_err(|e| format!("id_job: {e}"))?;
    let state: u32 = row.try_get("state").map_err(|e| format!("state: {e}"))?;
    let user: String = row
        .try_get("account")
        .map_err(|e| format!("account: {e}"))?;
    let uid: u64 = row.try_get("id_user").map_err(|e| format!("id_user: {e}"))?;
    let job_name: String = row
        .try_get("job_name")
        .map_err(|e| format!("job_name: {e}"))?;
    let time_start: i64 = row
        .try_get("time_start")
        .map_err(|e| format!("time_start: {e}"))?;
    let nodelist: Option<String> = row
        .try_get("nodelist")
        .map_err(|e| format!("nodelist: {e}"))?;

    let nodes = match nodelist.as_deref() {
        None | Some("") | Some("None assigned") | Some("(null)") => Vec::new(),
        Some(list) => match hostlist::expand(list) {
            Ok(nodes) => nodes,
            Err(e) => {
                // Keep the record; the node list is display/matching context.
                warn!(job_id, error = %e, "Unexpandable accounting node list");
                Vec::new()
            }
        },
    };

    let started = (time_start > 0)
        .then(|| DateTime::from_timestamp(time_start, 0))
        .flatten();

    Ok(JobRecord {
        job_id: JobId::new(job_id),
        nodes,
        user: user.clone(),
        state: JobState::from_raw(state),
        source: RecordSource::Accounting,
        job_name: Some(job_name),
        bank_account: Some(user),
        uid: u32::try_from(uid).ok(),
        started,
    })
}

/// In-memory accounting source for tests and dev runs.
pub struct StaticAccounting {
    jobs: Vec<JobRecord>,
    fail: bool,
}

impl StaticAccounting {
    pub fn new(jobs: Vec<JobRecord>) -> Self {
        Self { jobs, fail: false }
    }

    /// An accounting source that cannot be reached.
    pub fn unavailable() -> Self {
        Self {
            jobs: Vec::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl AccountingSource for StaticAccounting {
    async fn unfinished_jobs(&self) -> Result<Vec<JobRecord>, SourceError> {
        if self.fail {
            return Err(SourceError::Unavailable {
                source_name: "accounting database",
                reason: "static source configured to fail".to_string(),
            });
        }
        Ok(self.jobs.clone())
    }
}
