//! Record of hosts file contents written by the engine.

use crate::error::{HostsError, Result};
use crate::util::{now_ms, write_atomic};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const HISTORY_FILE: &str = "history.json";

/// One remembered hosts file version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Unique id (creation time plus a sequence suffix).
    pub id: String,
    /// Full hosts file text.
    pub content: String,
    /// When it was recorded, Unix milliseconds.
    pub add_time_ms: i64,
}

/// `history.json` in the data directory, capped at `limit` entries.
#[derive(Debug)]
pub struct HostsHistory {
    path: PathBuf,
    limit: usize,
    lock: Mutex<u64>,
}

impl HostsHistory {
    /// Opens the history in `dir`, keeping at most `limit` entries.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, limit: usize) -> Self {
        Self {
            path: dir.as_ref().join(HISTORY_FILE),
            limit,
            lock: Mutex::new(0),
        }
    }

    /// All entries, oldest first.
    ///
    /// # Errors
    ///
    /// [`HostsError::Io`] or [`HostsError::Parse`] if the file is unreadable.
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        let _guard = self.lock.lock();
        self.read()
    }

    /// Records the transition from `old` to `new`.
    ///
    /// `old` is added first unless it already is the latest entry, so the
    /// history always shows what a write replaced. Nothing is recorded when
    /// the content did not change.
    ///
    /// # Errors
    ///
    /// I/O or parse errors on the history file.
    pub fn record(&self, old: &str, new: &str) -> Result<()> {
        if old == new || self.limit == 0 {
            return Ok(());
        }
        let mut seq = self.lock.lock();
        let mut entries = self.read()?;
        let now = now_ms();

        if entries.last().is_none_or(|e| e.content != old) {
            *seq += 1;
            entries.push(entry(old, now, *seq));
        }
        *seq += 1;
        entries.push(entry(new, now, *seq));

        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }
        self.write(&entries)?;
        tracing::debug!(entries = entries.len(), "Recorded hosts history");
        Ok(())
    }

    /// Removes one entry. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// I/O or parse errors on the history file.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut entries = self.read()?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries)?;
        Ok(true)
    }

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// I/O errors on the history file.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock();
        self.write(&[])
    }

    fn read(&self) -> Result<Vec<HistoryEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| HostsError::parse(self.path.display().to_string(), e))
    }

    fn write(&self, entries: &[HistoryEntry]) -> Result<()> {
        let raw = serde_json::to_vec(entries)
            .map_err(|e| HostsError::parse(self.path.display().to_string(), e))?;
        write_atomic(&self.path, &raw)?;
        Ok(())
    }
}

fn entry(content: &str, now: i64, seq: u64) -> HistoryEntry {
    HistoryEntry {
        id: format!("{now}-{seq}"),
        content: content.to_string(),
        add_time_ms: now,
    }
}
