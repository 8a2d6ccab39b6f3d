use async_trait::async_trait;
use sqlx::SqlitePool;

use queuectl_core::config::{self, ConfigSnapshot};
use queuectl_core::error::{Error, Result};
use queuectl_core::repo::ConfigStore;

#[derive(Clone)]
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConfigStore for SqliteConfigStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        match self.get(key).await? {
            Some(v) => v
                .parse()
                .map_err(|_| Error::Validation(format!("config '{key}' is not an integer"))),
            None => Ok(default),
        }
    }

    async fn get_float(&self, key: &str, default: f64) -> Result<f64> {
        match self.get(key).await? {
            Some(v) => v
                .parse()
                .map_err(|_| Error::Validation(format!("config '{key}' is not a float"))),
            None => Ok(default),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<(String, String)>> {
        sqlx::query_as("SELECT key, value FROM config ORDER BY key")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn snapshot(&self) -> Result<ConfigSnapshot> {
        Ok(ConfigSnapshot {
            max_retries: self.get_int(config::KEY_MAX_RETRIES, 3).await?,
            backoff_base: self.get_float(config::KEY_BACKOFF_BASE, 2.0).await?,
            job_timeout_s: self.get_int(config::KEY_JOB_TIMEOUT_S, 0).await?,
        })
    }
}
