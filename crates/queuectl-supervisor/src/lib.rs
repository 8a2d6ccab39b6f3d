//! Spawns N worker processes, tracks their PIDs, and stops them gracefully
//! with a force-kill fallback (spec.md §4.7).
//!
//! The supervisor keeps no in-memory handle to the workers it starts — only
//! the PID file persists that, so a `stop` invoked from a fresh process still
//! works (spec.md §9, "no in-process shared state across workers").

mod pidfile;
mod signal;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use queuectl_core::error::{Error, Result};
use queuectl_core::repo::WorkerRepository;

pub use pidfile::PidFileStore;

const STALE_WORKER_THRESHOLD_S: i64 = 60;
const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct Supervisor {
    pid_file: PidFileStore,
    worker_repo: Arc<dyn WorkerRepository>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SupervisorStatus {
    pub pids: Vec<u32>,
    pub running_count: usize,
    pub active_worker_count: usize,
    pub workers: Vec<queuectl_core::model::WorkerInfo>,
}

impl Supervisor {
    pub fn new(pid_file_path: PathBuf, worker_repo: Arc<dyn WorkerRepository>) -> Self {
        Self {
            pid_file: PidFileStore::new(pid_file_path),
            worker_repo,
        }
    }

    /// Spawn `count` worker processes, each running `exe __worker-run --id
    /// <worker-id> [extra_args...]`, detached so they outlive this process.
    pub async fn start_workers(
        &self,
        count: usize,
        exe: &Path,
        extra_args: &[OsString],
    ) -> Result<Vec<u32>> {
        let cleaned = self
            .worker_repo
            .cleanup_stale(STALE_WORKER_THRESHOLD_S)
            .await?;
        if cleaned > 0 {
            tracing::info!(cleaned, "removed stale worker registry entries");
        }

        let supervisor_pid = std::process::id();
        let mut pids = Vec::with_capacity(count);

        for i in 0..count {
            let worker_id = format!("worker-{}-{supervisor_pid}", i + 1);
            let mut cmd = Command::new(exe);
            cmd.arg("__worker-run").arg("--id").arg(&worker_id);
            cmd.args(extra_args);

            let child = cmd
                .spawn()
                .map_err(|e| Error::Store(format!("spawning worker process: {e}")))?;
            let pid = child.id();
            tracing::info!(worker_id, pid, "started worker");
            // Deliberately drop `child` without waiting: the process keeps
            // running independently of this handle.
            pids.push(pid);
        }

        self.pid_file
            .save(&pids)
            .map_err(|e| Error::Store(format!("writing PID file: {e}")))?;

        Ok(pids)
    }

    /// Signal every tracked PID to terminate gracefully, escalating to
    /// force-kill for stragglers after `timeout`.
    pub fn stop_workers(&self, timeout: Duration) -> usize {
        let pids = self.pid_file.load();
        if pids.is_empty() {
            return 0;
        }

        let mut signaled = 0;
        for &pid in &pids {
            if signal::terminate(pid) {
                signaled += 1;
            }
        }

        let start = Instant::now();
        let mut remaining: Vec<u32> = pids.clone();
        while !remaining.is_empty() && start.elapsed() < timeout {
            remaining.retain(|&pid| signal::is_alive(pid));
            if !remaining.is_empty() {
                std::thread::sleep(POLL_INTERVAL);
            }
        }

        for pid in remaining {
            tracing::warn!(pid, "force-killing worker that did not stop gracefully");
            signal::force_kill(pid);
        }

        self.pid_file.clear();
        signaled
    }

    pub async fn status(&self) -> Result<SupervisorStatus> {
        let pids = self.pid_file.load();
        let running_count = pids.iter().filter(|&&pid| signal::is_alive(pid)).count();
        let active = self.worker_repo.active_workers(10).await?;

        Ok(SupervisorStatus {
            pids,
            running_count,
            active_worker_count: active.len(),
            workers: active,
        })
    }
}
