//! `${HOME}/.queuectl/` layout: `queue.db`, `workers.pid`, `logs/`.
//!
//! `QUEUECTL_DB_PATH` overrides the store location only; the PID file and log
//! directory are always siblings of the home-relative default (spec.md §6).

use std::path::PathBuf;

fn state_dir() -> PathBuf {
    let home = dirs_home();
    home.join(".queuectl")
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the store path from `QUEUECTL_DB_PATH`, falling back to
/// `${HOME}/.queuectl/queue.db`.
pub fn db_path() -> PathBuf {
    std::env::var_os("QUEUECTL_DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| state_dir().join("queue.db"))
}

pub fn pid_file_path() -> PathBuf {
    state_dir().join("workers.pid")
}

pub fn log_dir() -> PathBuf {
    state_dir().join("logs")
}
