//! The claim protocol (spec.md §4.2) and the rest of the job state machine.
//!
//! Claiming uses a single conditional `UPDATE ... WHERE id = (SELECT ...)
//! RETURNING ...` statement rather than `SELECT ... FOR UPDATE SKIP LOCKED`:
//! SQLite has no row-level locking, but it does serialize writers, so one
//! statement that both selects and updates at most one row is race-free
//! without needing a second transaction round-trip. This is the "conditional
//! UPDATE" alternative spec.md §4.2 calls out explicitly.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use queuectl_core::config;
use queuectl_core::error::{Error, Result};
use queuectl_core::model::{truncate_output, Job, JobStateCounts, NewJob};
use queuectl_core::repo::{ConfigStore, JobRepository};
use queuectl_core::time::{next_run_at, utcnow};

use crate::config_store::SqliteConfigStore;
use crate::row::{parse_ts, JobRow, JOB_COLUMNS};

#[derive(Clone)]
pub struct SqliteJobRepository {
    pool: SqlitePool,
    config: SqliteConfigStore,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        let config = SqliteConfigStore::new(pool.clone());
        Self { pool, config }
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn create(&self, new_job: NewJob) -> Result<Job> {
        if new_job.command.trim().is_empty() {
            return Err(Error::Validation("command must not be empty".into()));
        }

        let id = new_job.id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = utcnow();
        let run_at = new_job.run_at.unwrap_or(now);

        let snapshot = self.config.snapshot().await?;
        let max_retries = new_job.max_retries.unwrap_or(snapshot.max_retries);
        let backoff_base = new_job.backoff_base.unwrap_or(snapshot.backoff_base);

        let result = sqlx::query(
            "INSERT INTO jobs \
             (id, command, state, attempts, max_retries, backoff_base, priority, \
              run_at, timeout_s, created_at, updated_at) \
             VALUES (?, ?, 'pending', 0, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new_job.command)
        .bind(max_retries)
        .bind(backoff_base)
        .bind(new_job.priority)
        .bind(run_at.to_rfc3339())
        .bind(new_job.timeout_s)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await;

        if let Err(e) = &result {
            if e.as_database_error()
                .map(|d| d.is_unique_violation())
                .unwrap_or(false)
            {
                return Err(Error::DuplicateId(id));
            }
        }
        result.map_err(|e| Error::Store(e.to_string()))?;

        self.get(&id)
            .await?
            .ok_or_else(|| Error::Store("job vanished immediately after insert".into()))
    }

    /// Claims the next eligible job: pending/failed jobs whose `run_at` has
    /// arrived, plus `processing` jobs whose lock has outlived
    /// `lock_timeout_s` (a crashed worker's orphaned claim).
    async fn claim(&self, worker_id: &str) -> Result<Option<Job>> {
        let lock_timeout_s = self
            .config
            .get_int(config::KEY_LOCK_TIMEOUT_S, 300)
            .await?;
        let now = utcnow();
        let lock_cutoff = now - chrono::Duration::seconds(lock_timeout_s);

        let query = format!(
            "UPDATE jobs SET state = 'processing', locked_by = ?, locked_at = ?, updated_at = ? \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE ( \
                     (state IN ('pending', 'failed') AND (locked_by IS NULL OR locked_at IS NULL OR locked_at < ?)) \
                     OR (state = 'processing' AND locked_at < ?) \
                 ) \
                   AND run_at <= ? \
                 ORDER BY run_at ASC, priority DESC, created_at ASC \
                 LIMIT 1 \
             ) \
             RETURNING {JOB_COLUMNS}"
        );

        let row: Option<JobRow> = sqlx::query_as(&query)
            .bind(worker_id)
            .bind(now.to_rfc3339())
            .bind(now.to_rfc3339())
            .bind(lock_cutoff.to_rfc3339())
            .bind(lock_cutoff.to_rfc3339())
            .bind(now.to_rfc3339())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;

        row.map(Job::try_from).transpose()
    }

    async fn mark_success(
        &self,
        id: &str,
        exit_code: i64,
        stdout: &str,
        stderr: &str,
        duration_ms: i64,
    ) -> Result<()> {
        let now = utcnow();
        sqlx::query(
            "UPDATE jobs SET state = 'completed', last_exit_code = ?, stdout = ?, stderr = ?, \
             duration_ms = ?, locked_by = NULL, locked_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(exit_code)
        .bind(truncate_output(stdout))
        .bind(truncate_output(stderr))
        .bind(duration_ms)
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn mark_failure(
        &self,
        id: &str,
        exit_code: i64,
        stdout: &str,
        stderr: &str,
        duration_ms: i64,
    ) -> Result<()> {
        let Some(job) = self.get(id).await? else {
            return Ok(());
        };

        let attempts = job.attempts + 1;
        let now = utcnow();

        if attempts >= job.max_retries {
            sqlx::query(
                "UPDATE jobs SET state = 'dead', attempts = ?, last_exit_code = ?, stdout = ?, \
                 stderr = ?, duration_ms = ?, locked_by = NULL, locked_at = NULL, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(attempts)
            .bind(exit_code)
            .bind(truncate_output(stdout))
            .bind(truncate_output(stderr))
            .bind(duration_ms)
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        } else {
            let max_backoff_s = self
                .config
                .get_float(config::KEY_MAX_BACKOFF_S, 3600.0)
                .await?;
            let run_at = next_run_at(attempts as u32, job.backoff_base, max_backoff_s);

            sqlx::query(
                "UPDATE jobs SET state = 'failed', attempts = ?, run_at = ?, last_exit_code = ?, \
                 stdout = ?, stderr = ?, duration_ms = ?, locked_by = NULL, locked_at = NULL, \
                 updated_at = ? WHERE id = ?",
            )
            .bind(attempts)
            .bind(run_at.to_rfc3339())
            .bind(exit_code)
            .bind(truncate_output(stdout))
            .bind(truncate_output(stderr))
            .bind(duration_ms)
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        }

        Ok(())
    }

    async fn retry_from_dlq(&self, id: &str) -> Result<bool> {
        let now = utcnow();
        let result = sqlx::query(
            "UPDATE jobs SET state = 'pending', attempts = 0, run_at = ?, locked_by = NULL, \
             locked_at = NULL, updated_at = ? WHERE id = ? AND state = 'dead'",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?");
        let row: Option<JobRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        row.map(Job::try_from).transpose()
    }

    async fn list(
        &self,
        state: Option<&str>,
        limit: Option<i64>,
        pending_ready_only: bool,
    ) -> Result<Vec<Job>> {
        let mut query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE 1 = 1");
        if state.is_some() {
            query.push_str(" AND state = ?");
        }
        if pending_ready_only {
            query.push_str(" AND state = 'pending' AND run_at <= ?");
        }
        query.push_str(" ORDER BY created_at DESC");
        if limit.is_some() {
            query.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query_as(&query);
        if let Some(state) = state {
            q = q.bind(state);
        }
        if pending_ready_only {
            q = q.bind(utcnow().to_rfc3339());
        }
        if let Some(limit) = limit {
            q = q.bind(limit);
        }

        let rows: Vec<JobRow> = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn list_dlq(&self, limit: Option<i64>) -> Result<Vec<Job>> {
        self.list(Some("dead"), limit, false).await
    }

    async fn state_counts(&self) -> Result<JobStateCounts> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT state, COUNT(*) FROM jobs GROUP BY state")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| Error::Store(e.to_string()))?;

        let mut counts = JobStateCounts::default();
        for (state, count) in rows {
            match state.as_str() {
                "pending" => counts.pending = count,
                "processing" => counts.processing = count,
                "failed" => counts.failed = count,
                "completed" => counts.completed = count,
                "dead" => counts.dead = count,
                _ => {}
            }
        }
        Ok(counts)
    }

    async fn oldest_pending_age_s(&self) -> Result<Option<f64>> {
        let oldest: Option<String> = sqlx::query_scalar(
            "SELECT created_at FROM jobs WHERE state = 'pending' ORDER BY created_at ASC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        oldest
            .map(|s| parse_ts(&s).map(|dt| (utcnow() - dt).num_milliseconds() as f64 / 1000.0))
            .transpose()
    }

    async fn avg_duration_ms(&self) -> Result<Option<f64>> {
        sqlx::query_scalar("SELECT AVG(duration_ms) FROM jobs WHERE duration_ms IS NOT NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use queuectl_core::model::{NewJob, MAX_OUTPUT_BYTES};

    async fn temp_repo() -> (tempfile::TempDir, SqliteJobRepository) {
        let dir = tempfile::tempdir().unwrap();
        let pool = crate::connect(&dir.path().join("queue.db")).await.unwrap();
        (dir, SqliteJobRepository::new(pool))
    }

    #[tokio::test]
    async fn create_assigns_id_when_absent() {
        let (_dir, repo) = temp_repo().await;
        let job = repo
            .create(NewJob {
                command: "echo hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!job.id.is_empty());
        assert_eq!(job.state.as_str(), "pending");
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test]
    async fn create_rejects_duplicate_id() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("dup".into()),
            command: "echo hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        let err = repo
            .create(NewJob {
                id: Some("dup".into()),
                command: "echo bye".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateId(id) if id == "dup"));
    }

    #[tokio::test]
    async fn create_rejects_empty_command() {
        let (_dir, repo) = temp_repo().await;
        let err = repo
            .create(NewJob {
                command: "   ".into(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn create_freezes_config_snapshot_on_the_job() {
        let (_dir, repo) = temp_repo().await;
        repo.config.set("max_retries", "9").await.unwrap();
        let job = repo
            .create(NewJob {
                command: "echo hi".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(job.max_retries, 9);

        repo.config.set("max_retries", "1").await.unwrap();
        let reread = repo.get(&job.id).await.unwrap().unwrap();
        assert_eq!(reread.max_retries, 9, "existing job must not see later config changes");
    }

    #[tokio::test]
    async fn claim_excludes_future_run_at() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("future".into()),
            command: "echo hi".into(),
            run_at: Some(utcnow() + chrono::Duration::hours(1)),
            ..Default::default()
        })
        .await
        .unwrap();

        assert!(repo.claim("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_orders_by_run_at_then_priority_then_fifo() {
        let (_dir, repo) = temp_repo().await;
        let now = utcnow();
        repo.create(NewJob {
            id: Some("low".into()),
            command: "echo low".into(),
            priority: 0,
            run_at: Some(now),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.create(NewJob {
            id: Some("high".into()),
            command: "echo high".into(),
            priority: 100,
            run_at: Some(now),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.create(NewJob {
            id: Some("later".into()),
            command: "echo later".into(),
            priority: 1000,
            run_at: Some(now + chrono::Duration::hours(1)),
            ..Default::default()
        })
        .await
        .unwrap();

        let first = repo.claim("w1").await.unwrap().unwrap();
        assert_eq!(first.id, "high");
        let second = repo.claim("w1").await.unwrap().unwrap();
        assert_eq!(second.id, "low");
        assert!(repo.claim("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_is_exclusive_across_concurrent_callers() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("race".into()),
            command: "echo hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        let repo = std::sync::Arc::new(repo);
        let (a, b) = tokio::join!(
            { let r = repo.clone(); async move { r.claim("w1").await.unwrap() } },
            { let r = repo.clone(); async move { r.claim("w2").await.unwrap() } },
        );
        let claimed = [a, b].into_iter().flatten().count();
        assert_eq!(claimed, 1, "exactly one caller must win the claim");
    }

    #[tokio::test]
    async fn concurrent_claim_stress_never_double_claims() {
        let (_dir, repo) = temp_repo().await;
        const JOBS: usize = 40;
        const WORKERS: usize = 8;

        for i in 0..JOBS {
            repo.create(NewJob {
                id: Some(format!("stress-{i}")),
                command: "echo hi".into(),
                priority: fastrand::i64(0..5),
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let repo = std::sync::Arc::new(repo);
        let mut handles = Vec::new();
        for w in 0..WORKERS {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let worker_id = format!("stress-worker-{w}");
                let mut claimed = Vec::new();
                while let Some(job) = repo.claim(&worker_id).await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            }));
        }

        let mut all_claimed = Vec::new();
        for h in handles {
            all_claimed.extend(h.await.unwrap());
        }

        assert_eq!(all_claimed.len(), JOBS, "every job must be claimed exactly once in total");
        let unique: std::collections::HashSet<_> = all_claimed.iter().collect();
        assert_eq!(unique.len(), JOBS, "no job may be claimed by more than one worker");
    }

    #[tokio::test]
    async fn claim_reclaims_after_lock_expiry() {
        let (_dir, repo) = temp_repo().await;
        repo.config.set("lock_timeout_s", "0").await.unwrap();
        repo.create(NewJob {
            id: Some("orphan".into()),
            command: "echo hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();

        let first = repo.claim("crashed-worker").await.unwrap().unwrap();
        assert_eq!(first.locked_by.as_deref(), Some("crashed-worker"));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = repo.claim("recovery-worker").await.unwrap().unwrap();
        assert_eq!(second.id, "orphan");
        assert_eq!(second.locked_by.as_deref(), Some("recovery-worker"));
    }

    #[tokio::test]
    async fn mark_failure_moves_to_dead_at_max_retries() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("dlq-1".into()),
            command: "false".into(),
            max_retries: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();

        repo.claim("w1").await.unwrap();
        repo.mark_failure("dlq-1", 1, "", "boom", 5).await.unwrap();
        let after_first = repo.get("dlq-1").await.unwrap().unwrap();
        assert_eq!(after_first.state.as_str(), "failed");
        assert_eq!(after_first.attempts, 1);
        assert!(after_first.run_at > after_first.created_at);

        repo.claim("w1").await.unwrap();
        repo.mark_failure("dlq-1", 1, "", "boom again", 5).await.unwrap();
        let dead = repo.get("dlq-1").await.unwrap().unwrap();
        assert_eq!(dead.state.as_str(), "dead");
        assert_eq!(dead.attempts, 2);
        assert!(dead.locked_by.is_none());
        assert!(repo.claim("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn mark_success_does_not_increment_attempts() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("ok".into()),
            command: "echo hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.claim("w1").await.unwrap();
        repo.mark_success("ok", 0, "hi\n", "", 3).await.unwrap();

        let job = repo.get("ok").await.unwrap().unwrap();
        assert_eq!(job.state.as_str(), "completed");
        assert_eq!(job.attempts, 0);
        assert_eq!(job.last_exit_code, Some(0));
        assert!(job.locked_by.is_none());
    }

    #[tokio::test]
    async fn output_is_truncated_to_8192_bytes() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("big".into()),
            command: "yes".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.claim("w1").await.unwrap();

        let huge = "x".repeat(20_000);
        repo.mark_success("big", 0, &huge, &huge, 1).await.unwrap();

        let job = repo.get("big").await.unwrap().unwrap();
        assert_eq!(job.stdout.unwrap().len(), MAX_OUTPUT_BYTES);
        assert_eq!(job.stderr.unwrap().len(), MAX_OUTPUT_BYTES);
    }

    #[tokio::test]
    async fn retry_from_dlq_only_succeeds_from_dead_state() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("pend".into()),
            command: "echo hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        assert!(!repo.retry_from_dlq("pend").await.unwrap());
        assert!(!repo.retry_from_dlq("nonexistent").await.unwrap());

        repo.create(NewJob {
            id: Some("dead-job".into()),
            command: "false".into(),
            max_retries: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.claim("w1").await.unwrap();
        repo.mark_failure("dead-job", 1, "", "boom", 5).await.unwrap();

        assert!(repo.retry_from_dlq("dead-job").await.unwrap());
        let revived = repo.get("dead-job").await.unwrap().unwrap();
        assert_eq!(revived.state.as_str(), "pending");
        assert_eq!(revived.attempts, 0);
        assert!(revived.locked_by.is_none());
    }

    #[tokio::test]
    async fn state_counts_reflect_lifecycle() {
        let (_dir, repo) = temp_repo().await;
        repo.create(NewJob {
            id: Some("p".into()),
            command: "echo hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        repo.create(NewJob {
            id: Some("c".into()),
            command: "echo hi".into(),
            ..Default::default()
        })
        .await
        .unwrap();
        let claimed = repo.claim("w1").await.unwrap().unwrap();
        repo.mark_success(&claimed.id, 0, "hi", "", 1).await.unwrap();

        let counts = repo.state_counts().await.unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.completed, 1);
    }

    #[tokio::test]
    async fn persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("queue.db");

        {
            let pool = crate::connect(&db).await.unwrap();
            let repo = SqliteJobRepository::new(pool);
            repo.create(NewJob {
                id: Some("durable".into()),
                command: "echo hi".into(),
                priority: 7,
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let pool = crate::connect(&db).await.unwrap();
        let repo = SqliteJobRepository::new(pool);
        let job = repo.get("durable").await.unwrap().unwrap();
        assert_eq!(job.priority, 7);
    }
}
