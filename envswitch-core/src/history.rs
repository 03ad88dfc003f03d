//! Append-only log of switch attempts, stored as a YAML sequence.

use crate::{fsutil, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// One switch attempt
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SwitchEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub to: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    #[serde(default)]
    pub tools_count: usize,
    #[serde(default)]
    pub duration_ms: u64,
}

impl SwitchEntry {
    pub fn success(
        from: Option<&str>,
        to: &str,
        backup_path: Option<PathBuf>,
        tools_count: usize,
        duration: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            from: from.map(str::to_string),
            to: to.to_string(),
            success: true,
            error: None,
            backup_path,
            tools_count,
            duration_ms: millis(duration),
        }
    }

    pub fn failure(
        from: Option<&str>,
        to: &str,
        error: &str,
        backup_path: Option<PathBuf>,
        duration: Duration,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            from: from.map(str::to_string),
            to: to.to_string(),
            success: false,
            error: Some(error.to_string()),
            backup_path,
            tools_count: 0,
            duration_ms: millis(duration),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// History file handle
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries, oldest first; a missing or empty file is an empty log
    pub fn load(&self) -> Result<Vec<SwitchEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_yaml::from_str::<Option<Vec<SwitchEntry>>>(&text)?.unwrap_or_default())
    }

    pub fn append(&self, entry: SwitchEntry) -> Result<()> {
        let mut entries = self.load()?;
        entries.push(entry);
        self.write(&entries)?;
        debug!("History now holds {} entries", entries.len());
        Ok(())
    }

    /// The last `n` entries in chronological order; `n <= 0` yields none
    pub fn get_last(&self, n: i64) -> Result<Vec<SwitchEntry>> {
        if n <= 0 {
            return Ok(Vec::new());
        }
        let mut entries = self.load()?;
        let n = usize::try_from(n).unwrap_or(usize::MAX).min(entries.len());
        Ok(entries.split_off(entries.len() - n))
    }

    pub fn clear(&self) -> Result<()> {
        self.write(&[])
    }

    fn write(&self, entries: &[SwitchEntry]) -> Result<()> {
        let yaml = serde_yaml::to_string(entries)?;
        fsutil::write_atomic(&self.path, yaml.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(to: &str) -> SwitchEntry {
        SwitchEntry::success(Some("base"), to, None, 2, Duration::from_millis(15))
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::new(temp_dir.path().join("history.yaml"));
        assert!(log.load().unwrap().is_empty());
        assert!(log.get_last(5).unwrap().is_empty());
    }

    #[test]
    fn test_append_and_get_last() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::new(temp_dir.path().join("history.yaml"));
        for to in ["a", "b", "c"] {
            log.append(entry(to)).unwrap();
        }

        let last: Vec<String> = log.get_last(2).unwrap().into_iter().map(|e| e.to).collect();
        assert_eq!(last, vec!["b", "c"]);
        assert_eq!(log.get_last(100).unwrap().len(), 3);
        assert!(log.get_last(0).unwrap().is_empty());
        assert!(log.get_last(-1).unwrap().is_empty());
    }

    #[test]
    fn test_failure_entry_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::new(temp_dir.path().join("history.yaml"));
        let failed = SwitchEntry::failure(None, "work", "hook exited with 1", None, Duration::from_secs(1));
        log.append(failed.clone()).unwrap();

        let loaded = log.load().unwrap();
        assert_eq!(loaded, vec![failed]);
        assert!(!loaded[0].success);
        assert_eq!(loaded[0].duration_ms, 1000);
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let log = HistoryLog::new(temp_dir.path().join("history.yaml"));
        log.append(entry("a")).unwrap();
        log.clear().unwrap();

        assert!(log.path().exists());
        assert!(log.load().unwrap().is_empty());
    }
}
