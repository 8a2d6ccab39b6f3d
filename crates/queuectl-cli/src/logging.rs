//! Structured logging: a rotating file sink per process (10 MiB x 5 backups,
//! mirroring the original's `RotatingFileHandler`) plus stderr for errors.
//!
//! `tracing-appender`'s built-in rollers are time-based (hourly/daily), not
//! size-based, so the byte-capped rotation itself is a small custom
//! [`std::io::Write`] wrapped in `tracing_appender::non_blocking` for the
//! actual async hand-off — the non-blocking worker thread is what the crate
//! contributes here.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const MAX_BYTES: u64 = 10 * 1024 * 1024;
const BACKUP_COUNT: u32 = 5;

/// A file sink that rotates to `<name>.log.1` .. `<name>.log.5` once the
/// active file would exceed [`MAX_BYTES`], discarding the oldest backup.
struct RotatingFile {
    path: PathBuf,
    file: File,
    size: u64,
}

impl RotatingFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self { path, file, size })
    }

    fn rotate(&mut self) -> io::Result<()> {
        for i in (1..BACKUP_COUNT).rev() {
            let src = backup_path(&self.path, i);
            let dst = backup_path(&self.path, i + 1);
            if src.exists() {
                let _ = std::fs::rename(&src, &dst);
            }
        }
        let _ = std::fs::rename(&self.path, backup_path(&self.path, 1));
        self.file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.size = 0;
        Ok(())
    }
}

fn backup_path(base: &Path, index: u32) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

impl Write for RotatingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.size + buf.len() as u64 > MAX_BYTES && self.size > 0 {
            self.rotate()?;
        }
        let n = self.file.write(buf)?;
        self.size += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[derive(Clone)]
struct RotatingFileHandle(std::sync::Arc<Mutex<RotatingFile>>);

impl Write for RotatingFileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().unwrap().flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingFileHandle {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install a `tracing` subscriber writing to `<log_dir>/<file_stem>.log`
/// (rotated) and errors to stderr. Returns a guard that must be held for the
/// logger's lifetime — dropping it stops the background flush thread.
pub fn init(log_dir: &Path, file_stem: &str) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let path = log_dir.join(format!("{file_stem}.log"));
    let rotating = RotatingFileHandle(std::sync::Arc::new(Mutex::new(RotatingFile::open(path)?)));
    let (non_blocking, guard) = tracing_appender::non_blocking(rotating);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(tracing_subscriber::filter::LevelFilter::ERROR);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("initializing logging: {e}"))?;

    Ok(guard)
}
