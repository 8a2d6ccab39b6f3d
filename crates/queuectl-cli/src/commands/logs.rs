//! `logs <id>` — stored stdout/stderr, exit code, duration for a job.

use std::sync::Arc;

use anyhow::{bail, Result};
use queuectl_core::JobRepository;

pub async fn run(jobs: Arc<dyn JobRepository>, id: &str) -> Result<()> {
    let Some(job) = jobs.get(id).await? else {
        bail!("Job {id} not found");
    };

    println!("\nJob {}\n", job.id);
    println!("Command: {}", job.command);
    println!("State: {}", job.state);
    println!("Attempts: {}/{}", job.attempts, job.max_retries);
    println!(
        "Exit Code: {}",
        job.last_exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "N/A".into())
    );
    println!(
        "Duration: {}",
        job.duration_ms
            .map(|d| format!("{d}ms"))
            .unwrap_or_else(|| "N/A".into())
    );
    println!("Created: {}", job.created_at.to_rfc3339());
    println!("Updated: {}", job.updated_at.to_rfc3339());

    if let Some(stdout) = job.stdout.as_deref().filter(|s| !s.is_empty()) {
        println!("\nSTDOUT:\n{stdout}");
    }
    if let Some(stderr) = job.stderr.as_deref().filter(|s| !s.is_empty()) {
        println!("\nSTDERR:\n{stderr}");
    }
    if job.stdout.as_deref().unwrap_or("").is_empty() && job.stderr.as_deref().unwrap_or("").is_empty() {
        println!("\nNo output captured");
    }

    Ok(())
}
