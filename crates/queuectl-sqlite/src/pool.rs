//! Connection pool setup: WAL mode, busy-timeout, and migrations.
//!
//! Multi-writer concurrency across independent worker processes rests on
//! SQLite's WAL journal plus a generous busy-timeout so contention surfaces
//! as retried statements, not as errors.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};

use queuectl_core::error::{Error, Result};

/// Open (creating if absent) the SQLite store at `path` with WAL mode,
/// foreign keys enforced, and a 30s connection timeout (spec's connection
/// hygiene requirement).
pub async fn connect(path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::Store(format!("creating store directory: {e}")))?;
    }

    let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy().replace('\\', "/"));
    let options = SqliteConnectOptions::from_str(&url)
        .map_err(|e| Error::Store(format!("invalid store path: {e}")))?
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(30))
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(16)
        .acquire_timeout(Duration::from_secs(30))
        .connect_with(options)
        .await
        .map_err(|e| Error::Store(format!("connecting to store: {e}")))?;

    run_migrations(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(include_str!("../migrations/0001_init.sql"))
        .execute(pool)
        .await
        .map_err(|e| Error::Store(format!("running migrations: {e}")))?;

    let seeded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Store(e.to_string()))?;
    if seeded == 0 {
        sqlx::query("INSERT INTO schema_version (version) VALUES (1)")
            .execute(pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
    }

    for (key, value) in queuectl_core::config::DEFAULTS {
        sqlx::query("INSERT OR IGNORE INTO config (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
    }

    Ok(())
}
