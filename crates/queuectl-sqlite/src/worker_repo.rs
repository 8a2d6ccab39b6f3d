use async_trait::async_trait;
use sqlx::SqlitePool;

use queuectl_core::error::{Error, Result};
use queuectl_core::model::WorkerInfo;
use queuectl_core::repo::WorkerRepository;
use queuectl_core::time::utcnow;

use crate::row::parse_ts;

#[derive(Clone)]
pub struct SqliteWorkerRepository {
    pool: SqlitePool,
}

impl SqliteWorkerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WorkerRepository for SqliteWorkerRepository {
    async fn register(&self, worker_id: &str) -> Result<()> {
        let now = utcnow().to_rfc3339();
        sqlx::query(
            "INSERT INTO workers (id, started_at, last_heartbeat, status) VALUES (?, ?, ?, 'active') \
             ON CONFLICT(id) DO UPDATE SET started_at = excluded.started_at, \
             last_heartbeat = excluded.last_heartbeat, status = 'active'",
        )
        .bind(worker_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn heartbeat(&self, worker_id: &str) -> Result<()> {
        sqlx::query("UPDATE workers SET last_heartbeat = ? WHERE id = ?")
            .bind(utcnow().to_rfc3339())
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn deregister(&self, worker_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workers WHERE id = ?")
            .bind(worker_id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn active_workers(&self, stale_threshold_s: i64) -> Result<Vec<WorkerInfo>> {
        let threshold = (utcnow() - chrono::Duration::seconds(stale_threshold_s)).to_rfc3339();
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, started_at, last_heartbeat, status FROM workers \
             WHERE status = 'active' AND last_heartbeat >= ?",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;

        rows.into_iter()
            .map(|(id, started_at, last_heartbeat, status)| {
                Ok(WorkerInfo {
                    id,
                    started_at: parse_ts(&started_at)?,
                    last_heartbeat: parse_ts(&last_heartbeat)?,
                    status,
                })
            })
            .collect()
    }

    async fn cleanup_stale(&self, stale_threshold_s: i64) -> Result<u64> {
        let threshold = (utcnow() - chrono::Duration::seconds(stale_threshold_s)).to_rfc3339();
        let result = sqlx::query("DELETE FROM workers WHERE last_heartbeat < ?")
            .bind(threshold)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
