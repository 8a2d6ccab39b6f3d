use std::path::Path;

use queuectl_sqlite::SqlitePool;

pub async fn run(db_path: &Path, pool: &SqlitePool) -> anyhow::Result<()> {
    let _ = pool;
    println!("\u{2713} Database initialized at {}", db_path.display());
    Ok(())
}
