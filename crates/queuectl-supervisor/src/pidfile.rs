//! `{"pids": [...], "timestamp": epoch_seconds}` — the supervisor's source of
//! truth for "which workers did I spawn" (spec.md §4.7).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidFile {
    pub pids: Vec<u32>,
    pub timestamp: u64,
}

pub struct PidFileStore {
    path: PathBuf,
}

impl PidFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, pids: &[u32]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let data = PidFile {
            pids: pids.to_vec(),
            timestamp,
        };
        std::fs::write(&self.path, serde_json::to_vec(&data)?)
    }

    pub fn load(&self) -> Vec<u32> {
        let Ok(bytes) = std::fs::read(&self.path) else {
            return Vec::new();
        };
        serde_json::from_slice::<PidFile>(&bytes)
            .map(|data| data.pids)
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_of_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PidFileStore::new(dir.path().join("queuectl.pid"));
        assert_eq!(store.load(), Vec::<u32>::new());
    }

    #[test]
    fn save_then_load_round_trips_pids() {
        let dir = tempfile::tempdir().unwrap();
        let store = PidFileStore::new(dir.path().join("nested").join("queuectl.pid"));
        store.save(&[100, 101, 102]).unwrap();
        assert_eq!(store.load(), vec![100, 101, 102]);
    }

    #[test]
    fn save_overwrites_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let store = PidFileStore::new(dir.path().join("queuectl.pid"));
        store.save(&[1, 2]).unwrap();
        store.save(&[3]).unwrap();
        assert_eq!(store.load(), vec![3]);
    }

    #[test]
    fn clear_removes_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = PidFileStore::new(dir.path().join("queuectl.pid"));
        store.save(&[7]).unwrap();
        store.clear();
        assert!(!store.path().exists());
        assert_eq!(store.load(), Vec::<u32>::new());
    }

    #[test]
    fn timestamp_reflects_wall_clock_at_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = PidFileStore::new(dir.path().join("queuectl.pid"));
        let before = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        store.save(&[1]).unwrap();
        let bytes = std::fs::read(store.path()).unwrap();
        let data: PidFile = serde_json::from_slice(&bytes).unwrap();
        assert!(data.timestamp >= before);
    }
}
