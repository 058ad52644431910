use crate::config::AppConfig;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Background reclaim of orphaned staged files. The per-request pipeline
/// releases its own staged copy; this covers the copies a killed process
/// left behind.
pub struct StagingSweeper {
    staging_dir: PathBuf,
    max_age: Duration,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StagingSweeper {
    pub fn new(config: &AppConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            staging_dir: config.staging_dir.clone(),
            max_age: Duration::from_secs(config.staging_max_age_hours * 3600),
            interval: Duration::from_secs(config.staging_sweep_interval_secs),
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!("🧹 Staging sweeper started");

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Staging sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    async fn sweep(&self) {
        let mut entries = match tokio::fs::read_dir(&self.staging_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Staging sweep skipped, cannot read {}: {}", self.staging_dir.display(), e);
                return;
            }
        };

        let mut removed = 0u32;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let Some(age) = meta.modified().ok().and_then(|m| m.elapsed().ok()) else {
                continue;
            };
            if age > self.max_age {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => {
                        tracing::info!("Swept orphaned staged file: {}", entry.path().display());
                        removed += 1;
                    }
                    Err(e) => tracing::warn!(
                        "Failed to sweep staged file {}: {}",
                        entry.path().display(),
                        e
                    ),
                }
            }
        }

        if removed > 0 {
            tracing::info!("✅ Staging sweep removed {} orphaned file(s)", removed);
        }
    }
}
