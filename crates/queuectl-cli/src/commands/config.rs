//! `config get [key]` / `config set key value`.

use std::sync::Arc;

use anyhow::{bail, Result};
use queuectl_core::ConfigStore;

pub async fn get(config: Arc<dyn ConfigStore>, key: Option<String>) -> Result<()> {
    match key {
        Some(key) => match config.get(&key).await? {
            Some(value) => println!("{key}={value}"),
            None => bail!("Key '{key}' not found"),
        },
        None => {
            let mut all = config.get_all().await?;
            all.sort();
            for (k, v) in all {
                println!("{k}={v}");
            }
        }
    }
    Ok(())
}

pub async fn set(config: Arc<dyn ConfigStore>, key: String, value: String) -> Result<()> {
    validate_known_key(&key, &value)?;
    config.set(&key, &value).await?;
    println!("\u{2713} Set {key}={value}");
    Ok(())
}

fn validate_known_key(key: &str, value: &str) -> Result<()> {
    match key {
        "max_retries" | "poll_interval_ms" | "lock_timeout_s" | "job_timeout_s"
        | "max_backoff_s" => {
            value
                .parse::<i64>()
                .map_err(|_| anyhow::anyhow!("Invalid value for {key} (expected integer)"))?;
        }
        "backoff_base" => {
            value
                .parse::<f64>()
                .map_err(|_| anyhow::anyhow!("Invalid value for {key} (expected float)"))?;
        }
        _ => {}
    }
    Ok(())
}
