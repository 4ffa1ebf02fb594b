// Metrics Registry (SPEC_FULL.md §4.1). Grounded on
// `original_source/metrics.py`'s thread-safe Counter store, with the JSON
// dump made atomic (write-to-temp + rename) so a concurrent reader never
// observes a truncated file — the Python original wrote the file in place.

use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;

pub struct MetricsRegistry {
    counters: Mutex<HashMap<String, u64>>,
    started_at: Instant,
    started_at_utc: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    #[serde(flatten)]
    pub counters: HashMap<String, u64>,
    pub service_uptime_seconds: f64,
    pub last_updated_utc: String,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(HashMap::new()),
            started_at: Instant::now(),
            started_at_utc: chrono::Utc::now(),
        }
    }

    pub fn increment(&self, key: &str) {
        self.increment_by(key, 1);
    }

    pub fn increment_by(&self, key: &str, delta: u64) {
        let mut counters = self.counters.lock().unwrap();
        *counters.entry(key.to_string()).or_insert(0) += delta;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let counters = self.counters.lock().unwrap().clone();
        MetricsSnapshot {
            counters,
            service_uptime_seconds: self.started_at.elapsed().as_secs_f64(),
            last_updated_utc: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Write `snapshot()` to `path` atomically: serialize to a sibling temp
    /// file, then rename over the destination. `rename` within the same
    /// filesystem is atomic, so a concurrent reader of `path` sees either
    /// the old complete file or the new complete file, never a partial write.
    pub fn dump_to_file(&self, path: &Path) -> std::io::Result<()> {
        let snapshot = self.snapshot();
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let tmp_path = tmp_path_for(path);
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    #[cfg(test)]
    pub fn started_at_utc(&self) -> chrono::DateTime<chrono::Utc> {
        self.started_at_utc
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Spawns a background task that dumps `registry` to `path` every `interval`,
/// mirroring the original's `schedule`-library-driven daemon thread
/// (`start_metrics_scheduler`/`run_continuously`) but as a tokio task.
pub fn start_scheduled_snapshot(
    registry: std::sync::Arc<MetricsRegistry>,
    path: PathBuf,
    interval: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(err) = registry.dump_to_file(&path) {
                tracing::error!(error = %err, path = %path.display(), "failed to dump metrics snapshot");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increments_are_monotonic_and_concurrency_safe() {
        let registry = std::sync::Arc::new(MetricsRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    registry.increment("webhook_events_received");
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let snapshot = registry.snapshot();
        assert_eq!(snapshot.counters["webhook_events_received"], 8000);
    }

    #[test]
    fn snapshot_includes_uptime_and_timestamp() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot();
        assert!(snapshot.service_uptime_seconds >= 0.0);
        assert!(!snapshot.last_updated_utc.is_empty());
    }

    #[test]
    fn dump_to_file_is_readable_immediately_and_leaves_no_tmp_file() {
        let registry = MetricsRegistry::new();
        registry.increment("blocklist_ips_added");
        let path = std::env::temp_dir().join(format!("metrics-test-{}.json", std::process::id()));

        registry.dump_to_file(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("blocklist_ips_added"));
        assert!(!tmp_path_for(&path).exists());

        std::fs::remove_file(&path).ok();
    }
}
