//! Status document for operators.
//!
//! Holds the current watchlist and the last liquidation batch, each with the
//! local time of its last update. The file is rewritten whole on every
//! update; the most recent write wins.

use anyhow::{Context, Result};
use chrono::{Local, SecondsFormat};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Sink for watchlist and liquidation updates.
pub trait StatusRecorder: Send + Sync {
    fn record_watchlist(&self, accounts: &[String]);
    fn record_liquidations(&self, accounts: &[String]);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub last_update: String,
    pub list: Vec<String>,
}

impl StatusEntry {
    fn update(&mut self, accounts: &[String]) {
        self.last_update = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        self.list = accounts.to_vec();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDocument {
    pub watchlist: StatusEntry,
    pub liquidations: StatusEntry,
}

/// Status document persisted as pretty-printed JSON.
#[derive(Debug)]
pub struct JsonStatusFile {
    path: PathBuf,
    document: Mutex<StatusDocument>,
}

impl JsonStatusFile {
    /// Create the file, replacing whatever a previous run left behind.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let status = Self {
            path: path.as_ref().to_path_buf(),
            document: Mutex::new(StatusDocument::default()),
        };
        let document = status.document.lock().clone();
        status
            .write(&document)
            .with_context(|| format!("failed to initialize {}", status.path.display()))?;
        Ok(status)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> StatusDocument {
        self.document.lock().clone()
    }

    fn write(&self, document: &StatusDocument) -> Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut StatusDocument)) {
        // Hold the lock across the write so file contents follow update order
        let mut document = self.document.lock();
        apply(&mut document);
        match self.write(&document) {
            Ok(()) => debug!(path = %self.path.display(), "Status document written"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to write status document"),
        }
    }
}

impl StatusRecorder for JsonStatusFile {
    fn record_watchlist(&self, accounts: &[String]) {
        self.update(|doc| doc.watchlist.update(accounts));
    }

    fn record_liquidations(&self, accounts: &[String]) {
        self.update(|doc| doc.liquidations.update(accounts));
    }
}

/// Recorder that keeps every update in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct MemoryStatus {
    pub watchlists: Mutex<Vec<Vec<String>>>,
    pub liquidations: Mutex<Vec<Vec<String>>>,
}

#[cfg(test)]
impl StatusRecorder for MemoryStatus {
    fn record_watchlist(&self, accounts: &[String]) {
        self.watchlists.lock().push(accounts.to_vec());
    }

    fn record_liquidations(&self, accounts: &[String]) {
        self.liquidations.lock().push(accounts.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_create_resets_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status-logs.json");
        std::fs::write(&path, r#"{"stale": true}"#).unwrap();

        let status = JsonStatusFile::create(&path).unwrap();
        assert_eq!(status.document(), StatusDocument::default());
        assert_eq!(
            read(&path),
            serde_json::json!({
                "watchlist": { "last_update": "", "list": [] },
                "liquidations": { "last_update": "", "list": [] }
            })
        );
    }

    #[test]
    fn test_records_are_independent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status-logs.json");
        let status = JsonStatusFile::create(&path).unwrap();

        status.record_watchlist(&["a.near".to_string(), "b.near".to_string()]);
        status.record_liquidations(&["a.near".to_string()]);
        status.record_watchlist(&["b.near".to_string()]);

        let json = read(&path);
        assert_eq!(json["watchlist"]["list"], serde_json::json!(["b.near"]));
        assert_eq!(json["liquidations"]["list"], serde_json::json!(["a.near"]));
        let stamp = json["liquidations"]["last_update"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status-logs.json");
        let status = JsonStatusFile::create(&path).unwrap();
        drop(dir);

        status.record_watchlist(&["a.near".to_string()]);
        assert_eq!(status.document().watchlist.list, vec!["a.near".to_string()]);
    }

    #[test]
    fn test_create_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("status-logs.json");
        assert!(JsonStatusFile::create(path).is_err());
    }
}
