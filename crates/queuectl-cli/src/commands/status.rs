//! `status [--json]` — job-state counts, worker counts, oldest-pending age,
//! average duration, config (spec.md §6).

use std::sync::Arc;

use anyhow::Result;
use queuectl_core::{ConfigStore, JobRepository, WorkerRepository};
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport {
    db_path: String,
    job_counts: queuectl_core::model::JobStateCounts,
    workers: WorkersReport,
    metrics: MetricsReport,
    config: std::collections::BTreeMap<String, String>,
}

#[derive(Serialize)]
struct WorkersReport {
    active: usize,
    pids: Vec<u32>,
}

#[derive(Serialize)]
struct MetricsReport {
    oldest_pending_age_s: Option<f64>,
    avg_duration_ms: Option<f64>,
}

pub async fn run(
    db_path: &str,
    jobs: Arc<dyn JobRepository>,
    workers: Arc<dyn WorkerRepository>,
    config: Arc<dyn ConfigStore>,
    supervisor: &queuectl_supervisor::Supervisor,
    json: bool,
) -> Result<()> {
    let counts = jobs.state_counts().await?;
    let oldest_pending_age_s = jobs.oldest_pending_age_s().await?;
    let avg_duration_ms = jobs.avg_duration_ms().await?;
    let active = workers.active_workers(10).await?;
    let all_config: std::collections::BTreeMap<String, String> =
        config.get_all().await?.into_iter().collect();
    let sup_status = supervisor.status().await?;

    let report = StatusReport {
        db_path: db_path.to_string(),
        job_counts: counts.clone(),
        workers: WorkersReport {
            active: active.len(),
            pids: sup_status.pids.clone(),
        },
        metrics: MetricsReport {
            oldest_pending_age_s,
            avg_duration_ms,
        },
        config: all_config,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\nQueueCtl Status\n");
    println!("Database: {db_path}\n");

    println!("Job Counts:");
    println!("  pending: {}", counts.pending);
    println!("  processing: {}", counts.processing);
    println!("  failed: {}", counts.failed);
    println!("  completed: {}", counts.completed);
    println!("  dead: {}", counts.dead);

    println!("\nWorkers:");
    println!("  Active: {}", report.workers.active);
    println!("  PIDs: {:?}", report.workers.pids);

    println!("\nMetrics:");
    if let Some(age) = oldest_pending_age_s {
        println!("  Oldest pending: {age:.1}s ago");
    }
    if let Some(avg) = avg_duration_ms {
        println!("  Average duration: {avg:.0}ms");
    }
    println!();

    Ok(())
}
