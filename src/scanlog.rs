//! Append-only record of verification results.
//!
//! Entries are kept in a single JSON array file holding the most recent
//! `capacity` results. Writes run on the blocking pool and never fail the
//! caller: errors are logged and the entry is dropped.

use crate::error::{KioskError, Result};
use crate::verify::VerificationOutcome;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

pub const SCAN_LOG_FILE: &str = "scan_log.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

impl ScanLogEntry {
    pub fn new<S: Into<String>>(kind: S, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            kind: kind.into(),
            data,
        }
    }

    /// Entry for a finished verification. Failures are logged with their
    /// user-facing message.
    pub fn from_outcome(outcome: &VerificationOutcome) -> Result<Self> {
        let data = match outcome {
            VerificationOutcome::Certificate(result) => serde_json::to_value(result)?,
            VerificationOutcome::Product(result) => serde_json::to_value(result)?,
            VerificationOutcome::Compliance(result) => serde_json::to_value(result)?,
            VerificationOutcome::Failed(failure) => serde_json::json!({
                "message": failure.user_message(),
            }),
        };
        Ok(Self::new(outcome.kind(), data))
    }
}

/// Destination for scan log entries
pub trait ScanLogSink: Send + Sync {
    /// Record an entry. Must not block the caller and must not fail.
    fn append(&self, entry: ScanLogEntry);
}

/// JSON file sink bounded to the most recent entries
#[derive(Debug, Clone)]
pub struct JsonFileScanLog {
    path: PathBuf,
    capacity: usize,
    write_lock: Arc<Mutex<()>>,
}

impl JsonFileScanLog {
    pub fn new<P: Into<PathBuf>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Scan log inside a data directory, creating the directory if needed
    pub fn in_dir<P: AsRef<Path>>(dir: P, capacity: usize) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self::new(dir.as_ref().join(SCAN_LOG_FILE), capacity))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append synchronously, trimming to capacity
    pub fn record(&self, entry: ScanLogEntry) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut entries = match load_entries(&self.path) {
            Ok(entries) => entries,
            Err(KioskError::Json(e)) => {
                warn!(
                    "Scan log {} is unreadable ({}), starting a new one",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        entries.push(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        write_entries(&self.path, &entries)?;
        debug!(
            "Scan log {} now holds {} entries",
            self.path.display(),
            entries.len()
        );
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<ScanLogEntry>> {
        let _guard = self.write_lock.lock();
        load_entries(&self.path)
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        write_entries(&self.path, &[])
    }
}

impl ScanLogSink for JsonFileScanLog {
    fn append(&self, entry: ScanLogEntry) {
        let sink = self.clone();
        let write = move || {
            if let Err(e) = sink.record(entry) {
                error!("Failed to write scan log {}: {}", sink.path.display(), e);
            }
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(write);
            }
            Err(_) => write(),
        }
    }
}

/// Read every entry. A missing file is an empty log.
pub fn load_entries(path: &Path) -> Result<Vec<ScanLogEntry>> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

fn write_entries(path: &Path, entries: &[ScanLogEntry]) -> Result<()> {
    let data = serde_json::to_vec_pretty(entries)?;
    // Write-then-rename so readers never observe a half-written file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// In-memory sink for tests
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryScanLog {
    entries: Arc<Mutex<Vec<ScanLogEntry>>>,
}

#[cfg(test)]
impl MemoryScanLog {
    pub fn entries(&self) -> Vec<ScanLogEntry> {
        self.entries.lock().clone()
    }
}

#[cfg(test)]
impl ScanLogSink for MemoryScanLog {
    fn append(&self, entry: ScanLogEntry) {
        self.entries.lock().push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::{ProductResult, VerificationFailure};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_record_and_trim_to_capacity() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileScanLog::in_dir(dir.path(), 3).unwrap();

        for i in 0..5 {
            log.record(ScanLogEntry::new("product", json!({ "n": i })))
                .unwrap();
        }

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].data, json!({ "n": 2 }));
        assert_eq!(entries[2].data, json!({ "n": 4 }));
        assert_eq!(log.path(), dir.path().join(SCAN_LOG_FILE));
    }

    #[test]
    fn test_file_layout_uses_type_key() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileScanLog::in_dir(dir.path(), 10).unwrap();
        log.record(ScanLogEntry::new("certificate", json!({ "id": "CERT-COMP-1" })))
            .unwrap();

        let raw: Value =
            serde_json::from_slice(&fs::read(log.path()).unwrap()).unwrap();
        let first = &raw.as_array().unwrap()[0];
        assert_eq!(first["type"], "certificate");
        assert!(first["timestamp"].is_string());
        assert_eq!(first["data"]["id"], "CERT-COMP-1");
    }

    #[test]
    fn test_corrupt_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileScanLog::in_dir(dir.path(), 10).unwrap();
        fs::write(log.path(), b"{ not json").unwrap();

        log.record(ScanLogEntry::new("error", json!({}))).unwrap();
        assert_eq!(log.entries().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_file_reads_empty_and_clear() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileScanLog::in_dir(dir.path().join("nested"), 10).unwrap();
        assert!(log.entries().unwrap().is_empty());

        log.record(ScanLogEntry::new("product", json!({}))).unwrap();
        log.clear().unwrap();
        assert!(log.entries().unwrap().is_empty());
    }

    #[test]
    fn test_entry_from_outcome() {
        let product = VerificationOutcome::Product(ProductResult::not_found(Some("Tea"), None));
        let entry = ScanLogEntry::from_outcome(&product).unwrap();
        assert_eq!(entry.kind, "product");
        assert_eq!(entry.data["product_name"], "Tea");

        let failure = VerificationOutcome::Failed(VerificationFailure::unrecognized("???"));
        let entry = ScanLogEntry::from_outcome(&failure).unwrap();
        assert_eq!(entry.kind, "error");
        assert!(entry.data["message"].is_string());
    }

    #[tokio::test]
    async fn test_append_writes_in_background() {
        let dir = TempDir::new().unwrap();
        let log = JsonFileScanLog::in_dir(dir.path(), 10).unwrap();

        log.append(ScanLogEntry::new("product", json!({ "n": 1 })));

        let mut written = false;
        for _ in 0..50 {
            if log.entries().map(|e| e.len() == 1).unwrap_or(false) {
                written = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(written);
    }

    #[test]
    fn test_append_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes every write fail
        let path = dir.path().join("blocked");
        fs::create_dir_all(path.join("inner")).unwrap();
        let log = JsonFileScanLog::new(&path, 10);

        log.append(ScanLogEntry::new("product", json!({})));
        assert!(log.entries().is_err());
    }
}
