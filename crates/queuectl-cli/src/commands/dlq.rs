//! `dlq list [--limit N] [--json]` and `dlq retry <id>`.

use std::sync::Arc;

use anyhow::{bail, Result};
use queuectl_core::JobRepository;

pub async fn list(jobs: Arc<dyn JobRepository>, limit: Option<i64>, json: bool) -> Result<()> {
    let rows = jobs.list_dlq(limit).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("Dead letter queue is empty");
        return Ok(());
    }

    let table = crate::output::dlq_table(&rows);
    table.printstd();
    Ok(())
}

pub async fn retry(jobs: Arc<dyn JobRepository>, id: &str) -> Result<()> {
    if jobs.retry_from_dlq(id).await? {
        println!("\u{2713} Job {id} moved back to pending queue");
        Ok(())
    } else {
        bail!("Error: Job {id} not found in DLQ");
    }
}
