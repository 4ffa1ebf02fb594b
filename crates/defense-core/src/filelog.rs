// Append-only JSON-lines event logs (SPEC_FULL.md §6 "Persisted files",
// §10.3). One `JsonLinesLog` per file; each `append` call serializes one
// struct as a single JSON line and flushes before returning, so a crash
// right after a write never loses more than the in-flight record.

use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct JsonLinesLog {
    path: PathBuf,
    file: Mutex<std::fs::File>,
}

impl JsonLinesLog {
    pub fn open(dir: &Path, filename: &str) -> std::io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(filename);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn append<T: Serialize>(&self, record: &T) -> std::io::Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap();
        file.write_all(line.as_bytes())?;
        file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HoneypotHitRecord {
    pub timestamp: String,
    pub ip: String,
    pub ua: String,
    pub method: String,
    pub path: String,
    pub referer: String,
    pub headers: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockEventRecord {
    pub timestamp: String,
    pub ip: String,
    pub reason: String,
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertEventRecord {
    pub timestamp: String,
    pub reason: String,
    pub ip: String,
    pub transport: String,
    pub delivered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommunityReportRecord {
    pub timestamp: String,
    pub ip: String,
    pub reason: String,
    pub delivered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_writes_one_json_object_per_line() {
        let dir = std::env::temp_dir().join(format!("defense-core-filelog-test-{}", std::process::id()));
        let log = JsonLinesLog::open(&dir, "honeypot_hits.log").unwrap();

        log.append(&HoneypotHitRecord {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            ip: "10.0.0.1".to_string(),
            ua: "curl/8.0".to_string(),
            method: "GET".to_string(),
            path: "/tarpit/a".to_string(),
            referer: String::new(),
            headers: Default::default(),
        })
        .unwrap();
        log.append(&HoneypotHitRecord {
            timestamp: "2026-01-01T00:00:01Z".to_string(),
            ip: "10.0.0.2".to_string(),
            ua: "curl/8.0".to_string(),
            method: "GET".to_string(),
            path: "/tarpit/b".to_string(),
            referer: String::new(),
            headers: Default::default(),
        })
        .unwrap();

        let contents = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let _: serde_json::Value = serde_json::from_str(line).unwrap();
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
