//! Row <-> domain-model conversion. SQLite has no native timestamp type, so
//! every instant is stored as an RFC-3339 string and parsed back explicitly
//! rather than leaning on sqlx's chrono-for-sqlite guesswork.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use queuectl_core::error::{Error, Result};
use queuectl_core::model::{Job, JobState};

#[derive(FromRow)]
pub struct JobRow {
    pub id: String,
    pub command: String,
    pub state: String,
    pub attempts: i64,
    pub max_retries: i64,
    pub backoff_base: f64,
    pub priority: i64,
    pub run_at: String,
    pub timeout_s: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub locked_by: Option<String>,
    pub locked_at: Option<String>,
    pub last_exit_code: Option<i64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub duration_ms: Option<i64>,
}

pub fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Store(format!("corrupt timestamp '{s}': {e}")))
}

fn parse_opt_ts(s: &Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.as_deref().map(parse_ts).transpose()
}

impl TryFrom<JobRow> for Job {
    type Error = Error;

    fn try_from(row: JobRow) -> Result<Job> {
        Ok(Job {
            id: row.id,
            command: row.command,
            state: row.state.parse::<JobState>()?,
            attempts: row.attempts,
            max_retries: row.max_retries,
            backoff_base: row.backoff_base,
            priority: row.priority,
            run_at: parse_ts(&row.run_at)?,
            timeout_s: row.timeout_s,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            locked_by: row.locked_by,
            locked_at: parse_opt_ts(&row.locked_at)?,
            last_exit_code: row.last_exit_code,
            stdout: row.stdout,
            stderr: row.stderr,
            duration_ms: row.duration_ms,
        })
    }
}

pub const JOB_COLUMNS: &str = "id, command, state, attempts, max_retries, backoff_base, \
    priority, run_at, timeout_s, created_at, updated_at, locked_by, locked_at, \
    last_exit_code, stdout, stderr, duration_ms";
