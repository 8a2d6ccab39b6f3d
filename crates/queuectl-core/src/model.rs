use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum bytes retained for a job's captured stdout/stderr.
pub const MAX_OUTPUT_BYTES: usize = 8192;

/// Truncate a string to at most `MAX_OUTPUT_BYTES` bytes, byte-exact (not
/// character-exact): the cut happens on the raw buffer before any UTF-8
/// concerns, so multi-byte sequences never push the stored size past the cap.
pub fn truncate_output(s: &str) -> String {
    if s.len() <= MAX_OUTPUT_BYTES {
        return s.to_string();
    }
    String::from_utf8_lossy(&s.as_bytes()[..MAX_OUTPUT_BYTES]).into_owned()
}

/// Lifecycle state of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Failed,
    Completed,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Failed => "failed",
            JobState::Completed => "completed",
            JobState::Dead => "dead",
        }
    }
}

impl std::str::FromStr for JobState {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "failed" => Ok(JobState::Failed),
            "completed" => Ok(JobState::Completed),
            "dead" => Ok(JobState::Dead),
            other => Err(crate::error::Error::Validation(format!(
                "unknown job state '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single unit of work: a shell command plus scheduling/retry metadata and
/// (once executed) its last outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub attempts: i64,
    pub max_retries: i64,
    pub backoff_base: f64,
    pub priority: i64,
    pub run_at: DateTime<Utc>,
    pub timeout_s: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub locked_by: Option<String>,
    pub locked_at: Option<DateTime<Utc>>,
    pub last_exit_code: Option<i64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub duration_ms: Option<i64>,
}

/// Parameters accepted by [`crate::repo::JobRepository::create`].
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub id: Option<String>,
    pub command: String,
    pub priority: i64,
    pub run_at: Option<DateTime<Utc>>,
    pub timeout_s: Option<i64>,
    pub max_retries: Option<i64>,
    pub backoff_base: Option<f64>,
}

/// Worker registry entry used for liveness/crash-recovery bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub status: String,
}

/// Aggregate counts backing the `status` command.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStateCounts {
    pub pending: i64,
    pub processing: i64,
    pub failed: i64,
    pub completed: i64,
    pub dead: i64,
}
