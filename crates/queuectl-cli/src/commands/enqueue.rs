//! `enqueue <json|--file path>` — insert one or many jobs (spec.md §6).

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use queuectl_core::model::NewJob;
use queuectl_core::JobRepository;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct JobSpec {
    id: Option<String>,
    command: Option<String>,
    #[serde(default)]
    priority: i64,
    run_at: Option<String>,
    timeout_s: Option<i64>,
    max_retries: Option<i64>,
    backoff_base: Option<f64>,
}

pub async fn run(
    jobs: Arc<dyn JobRepository>,
    job_data: Option<String>,
    file: Option<std::path::PathBuf>,
) -> Result<()> {
    let raw = match (job_data, file) {
        (_, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        (Some(inline), None) => inline,
        (None, None) => bail!("Error: Provide job data or --file"),
    };

    let parsed: serde_json::Value = serde_json::from_str(&raw).context("Invalid JSON")?;
    let specs: Vec<JobSpec> = match parsed {
        serde_json::Value::Array(_) => {
            serde_json::from_value(parsed).context("Invalid JSON")?
        }
        other => vec![serde_json::from_value(other).context("Invalid JSON")?],
    };

    let mut enqueued = 0usize;
    for spec in specs {
        let Some(command) = spec.command else {
            eprintln!("Error: Job missing 'command' field");
            continue;
        };

        let run_at = match spec.run_at {
            Some(s) => match queuectl_core::time::parse_iso(&s) {
                Ok(dt) => Some(dt),
                Err(e) => {
                    eprintln!("Error enqueueing job: {e}");
                    continue;
                }
            },
            None => None,
        };

        let new_job = NewJob {
            id: spec.id,
            command,
            priority: spec.priority,
            run_at,
            timeout_s: spec.timeout_s,
            max_retries: spec.max_retries,
            backoff_base: spec.backoff_base,
        };

        match jobs.create(new_job).await {
            Ok(job) => {
                println!("\u{2713} Enqueued job {}", job.id);
                enqueued += 1;
            }
            Err(e) => eprintln!("Error enqueueing job: {e}"),
        }
    }

    if enqueued == 0 {
        bail!("No jobs were enqueued");
    }
    println!("\nSuccessfully enqueued {enqueued} job(s)");
    Ok(())
}
