//! The worker loop: `init -> registered -> polling <-> executing -> terminating -> deregistered`.
//!
//! A worker processes exactly one job at a time and never holds more than one
//! claim (spec.md §4.6). This crate only implements the loop; signal handling
//! and process bootstrapping live in the CLI binary that runs it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use queuectl_core::config;
use queuectl_core::error::Result;
use queuectl_core::repo::{ConfigStore, JobRepository, WorkerRepository};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

/// Drives one worker's claim/execute/record cycle until `shutdown` is set.
pub struct WorkerLoop {
    pub worker_id: String,
    pub jobs: Arc<dyn JobRepository>,
    pub workers: Arc<dyn WorkerRepository>,
    pub config: Arc<dyn ConfigStore>,
}

impl WorkerLoop {
    pub fn new(
        worker_id: impl Into<String>,
        jobs: Arc<dyn JobRepository>,
        workers: Arc<dyn WorkerRepository>,
        config: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            jobs,
            workers,
            config,
        }
    }

    /// Run until `shutdown` flips to `true`, deregistering even if a
    /// mid-loop error forces an early return.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        self.workers.register(&self.worker_id).await?;
        tracing::info!(worker_id = %self.worker_id, "worker registered");

        let result = self.poll_loop(shutdown).await;

        tracing::info!(worker_id = %self.worker_id, "worker shutting down");
        self.workers.deregister(&self.worker_id).await?;

        result
    }

    async fn poll_loop(&self, shutdown: Arc<AtomicBool>) -> Result<()> {
        let mut last_heartbeat = Instant::now();

        loop {
            let poll_interval_ms = self
                .config
                .get_int(config::KEY_POLL_INTERVAL_MS, 500)
                .await?;

            match self.jobs.claim(&self.worker_id).await? {
                Some(job) => self.process_job(job).await?,
                None => tokio::time::sleep(Duration::from_millis(poll_interval_ms as u64)).await,
            }

            if last_heartbeat.elapsed() >= HEARTBEAT_INTERVAL {
                if let Err(e) = self.workers.heartbeat(&self.worker_id).await {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "heartbeat failed");
                }
                last_heartbeat = Instant::now();
            }

            if shutdown.load(Ordering::SeqCst) {
                break;
            }
        }

        Ok(())
    }

    async fn process_job(&self, job: queuectl_core::Job) -> Result<()> {
        tracing::info!(worker_id = %self.worker_id, job_id = %job.id, command = %job.command, "claimed job");

        let outcome = self.execute_with_effective_timeout(&job).await;

        let record = match outcome {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(worker_id = %self.worker_id, job_id = %job.id, error = %e, "worker error processing job");
                self.jobs
                    .mark_failure(&job.id, -1, "", &format!("Worker error: {e}"), 0)
                    .await?;
                return Ok(());
            }
        };

        if record.exit_code == 0 {
            tracing::info!(worker_id = %self.worker_id, job_id = %job.id, duration_ms = record.duration_ms, "job completed");
            self.jobs
                .mark_success(
                    &job.id,
                    record.exit_code,
                    &record.stdout,
                    &record.stderr,
                    record.duration_ms,
                )
                .await?;
        } else {
            tracing::warn!(worker_id = %self.worker_id, job_id = %job.id, exit_code = record.exit_code, "job failed");
            self.jobs
                .mark_failure(
                    &job.id,
                    record.exit_code,
                    &record.stdout,
                    &record.stderr,
                    record.duration_ms,
                )
                .await?;
        }

        Ok(())
    }

    async fn execute_with_effective_timeout(
        &self,
        job: &queuectl_core::Job,
    ) -> Result<queuectl_executor::ExecutionResult> {
        let timeout_s = match job.timeout_s {
            Some(t) if t > 0 => Some(t),
            _ => {
                let global = self.config.get_int(config::KEY_JOB_TIMEOUT_S, 0).await?;
                if global > 0 {
                    Some(global)
                } else {
                    None
                }
            }
        };

        let command = job.command.clone();
        let result = tokio::task::spawn_blocking(move || queuectl_executor::execute(&command, timeout_s))
            .await
            .map_err(|e| queuectl_core::Error::Store(format!("executor task panicked: {e}")))?;

        Ok(result)
    }
}
