//! On-disk TTL cache for raw API responses.
//!
//! Layout: `{root}/{blake3(key)}.json`, each file holding
//! `{"cached_at": <unix secs>, "payload": <response JSON>}`.
//!
//! - Writes are atomic (write to .tmp, rename into place)
//! - Missing, corrupt and expired entries all read as a miss
//! - `status` and `clean` back the CLI cache commands

use super::provider::DataError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    cached_at: f64,
    payload: serde_json::Value,
}

/// Summary of the cache directory contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub root: PathBuf,
    pub entries: usize,
    pub expired: usize,
    pub corrupt: usize,
    pub total_bytes: u64,
}

pub struct ResponseCache {
    root: PathBuf,
    ttl: Duration,
}

fn now_secs() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

impl ResponseCache {
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            root: root.into(),
            ttl,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path of the entry for a request key.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let hash = blake3::hash(key.as_bytes()).to_hex();
        self.root.join(format!("{hash}.json"))
    }

    /// Cached payload for `key`, if present and younger than the TTL.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.entry_path(key);
        let entry = read_entry(&path)?;
        let age = now_secs() - entry.cached_at;
        if age > self.ttl.as_secs_f64() {
            debug!(key, age_secs = age, "cache entry expired");
            return None;
        }
        debug!(key, "cache hit");
        Some(entry.payload)
    }

    /// Store `payload` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, payload: &serde_json::Value) -> Result<(), DataError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| DataError::Cache(format!("failed to create dir: {e}")))?;

        let entry = CacheEntry {
            cached_at: now_secs(),
            payload: payload.clone(),
        };
        let bytes = serde_json::to_vec(&entry)
            .map_err(|e| DataError::Cache(format!("entry serialization: {e}")))?;

        let path = self.entry_path(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, bytes)
            .map_err(|e| DataError::Cache(format!("write {}: {e}", tmp_path.display())))?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Cache(format!("atomic rename failed: {e}"))
        })?;
        Ok(())
    }

    pub fn status(&self) -> Result<CacheStatus, DataError> {
        let mut status = CacheStatus {
            root: self.root.clone(),
            ..Default::default()
        };
        let now = now_secs();
        for path in self.entry_files()? {
            status.entries += 1;
            status.total_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            match read_entry(&path) {
                Some(entry) if now - entry.cached_at > self.ttl.as_secs_f64() => {
                    status.expired += 1
                }
                Some(_) => {}
                None => status.corrupt += 1,
            }
        }
        Ok(status)
    }

    /// Delete entries older than `older_than` (all entries when `None`).
    /// Corrupt entries are always deleted. Returns the number removed.
    pub fn clean(&self, older_than: Option<Duration>) -> Result<usize, DataError> {
        let now = now_secs();
        let mut removed = 0;
        for path in self.entry_files()? {
            let stale = match (read_entry(&path), older_than) {
                (None, _) | (Some(_), None) => true,
                (Some(entry), Some(limit)) => now - entry.cached_at > limit.as_secs_f64(),
            };
            if stale {
                fs::remove_file(&path)
                    .map_err(|e| DataError::Cache(format!("remove {}: {e}", path.display())))?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entry_files(&self) -> Result<Vec<PathBuf>, DataError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries =
            fs::read_dir(&self.root).map_err(|e| DataError::Cache(format!("read dir: {e}")))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Cache(format!("dir entry: {e}")))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

fn read_entry(path: &Path) -> Option<CacheEntry> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt cache entry");
            None
        }
    }
}
