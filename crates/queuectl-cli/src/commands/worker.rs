//! `worker start --count N`, `worker stop`, and the hidden `__worker-run`
//! re-exec target the supervisor spawns (spec.md §4.6, §4.7).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use queuectl_core::{ConfigStore, JobRepository, WorkerRepository};
use queuectl_supervisor::Supervisor;

pub async fn start(supervisor: &Supervisor, count: usize, db_path: &std::path::Path) -> Result<()> {
    if count < 1 {
        bail!("Error: Worker count must be >= 1");
    }

    let exe = std::env::current_exe().context("resolving current executable")?;
    let extra_args = vec![
        std::ffi::OsString::from("--db-path"),
        db_path.as_os_str().to_os_string(),
    ];

    let pids = supervisor.start_workers(count, &exe, &extra_args).await?;
    println!("Started {} worker(s)", pids.len());
    Ok(())
}

pub fn stop(supervisor: &Supervisor) -> Result<()> {
    let stopped = supervisor.stop_workers(Duration::from_secs(30));
    if stopped > 0 {
        println!("Stopped {stopped} worker(s)");
    } else {
        println!("No workers to stop");
    }
    Ok(())
}

/// Entry point for the hidden `__worker-run` subcommand: runs the worker
/// loop in this process until a terminate/interrupt signal arrives.
pub async fn run_worker(
    worker_id: String,
    jobs: Arc<dyn JobRepository>,
    workers: Arc<dyn WorkerRepository>,
    config: Arc<dyn ConfigStore>,
) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    install_shutdown_handler(shutdown.clone());

    let worker_loop = queuectl_worker::WorkerLoop::new(worker_id, jobs, workers, config);
    worker_loop.run(shutdown).await?;
    Ok(())
}

fn install_shutdown_handler(shutdown: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = tokio::signal::ctrl_c() => {}
        }
        tracing::info!("shutdown signal received");
        shutdown.store(true, Ordering::SeqCst);
    });
}
