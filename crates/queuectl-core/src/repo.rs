//! Repository traits: the only interfaces workers, the supervisor, and the
//! CLI use to touch persisted state. Storage backends implement these.

use async_trait::async_trait;

use crate::config::ConfigSnapshot;
use crate::error::Result;
use crate::model::{Job, JobStateCounts, NewJob, WorkerInfo};

/// The sole writer of job rows; encapsulates the claim/retry/DLQ state machine.
#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, new_job: NewJob) -> Result<Job>;

    /// Atomically claim at most one eligible job for `worker_id`.
    async fn claim(&self, worker_id: &str) -> Result<Option<Job>>;

    async fn mark_success(
        &self,
        id: &str,
        exit_code: i64,
        stdout: &str,
        stderr: &str,
        duration_ms: i64,
    ) -> Result<()>;

    async fn mark_failure(
        &self,
        id: &str,
        exit_code: i64,
        stdout: &str,
        stderr: &str,
        duration_ms: i64,
    ) -> Result<()>;

    /// Move a `dead` job back to `pending`, resetting attempts. Returns
    /// whether the transition occurred.
    async fn retry_from_dlq(&self, id: &str) -> Result<bool>;

    async fn get(&self, id: &str) -> Result<Option<Job>>;

    async fn list(
        &self,
        state: Option<&str>,
        limit: Option<i64>,
        pending_ready_only: bool,
    ) -> Result<Vec<Job>>;

    async fn list_dlq(&self, limit: Option<i64>) -> Result<Vec<Job>>;

    async fn state_counts(&self) -> Result<JobStateCounts>;

    /// Age, in seconds, of the oldest still-pending job.
    async fn oldest_pending_age_s(&self) -> Result<Option<f64>>;

    /// Mean `duration_ms` across jobs that have executed at least once.
    async fn avg_duration_ms(&self) -> Result<Option<f64>>;
}

/// Worker registration, heartbeat, and stale-entry cleanup.
#[async_trait]
pub trait WorkerRepository: Send + Sync {
    async fn register(&self, worker_id: &str) -> Result<()>;
    async fn heartbeat(&self, worker_id: &str) -> Result<()>;
    async fn deregister(&self, worker_id: &str) -> Result<()>;
    async fn active_workers(&self, stale_threshold_s: i64) -> Result<Vec<WorkerInfo>>;
    async fn cleanup_stale(&self, stale_threshold_s: i64) -> Result<u64>;
}

/// Typed get/set over the config table.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn get_int(&self, key: &str, default: i64) -> Result<i64>;
    async fn get_float(&self, key: &str, default: f64) -> Result<f64>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn get_all(&self) -> Result<Vec<(String, String)>>;
    async fn snapshot(&self) -> Result<ConfigSnapshot>;
}
