//! `list [--state S] [--limit N] [--pending-ready-only] [--json]`.

use std::sync::Arc;

use anyhow::Result;
use queuectl_core::JobRepository;

pub async fn run(
    jobs: Arc<dyn JobRepository>,
    state: Option<String>,
    limit: Option<i64>,
    pending_ready_only: bool,
    json: bool,
) -> Result<()> {
    let rows = jobs
        .list(state.as_deref(), limit, pending_ready_only)
        .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No jobs found");
        return Ok(());
    }

    let table = crate::output::job_table(&rows);
    table.printstd();
    if rows.len() > 50 {
        println!("\n... and {} more jobs", rows.len() - 50);
    }

    Ok(())
}
