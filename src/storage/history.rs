//! Append-only CSV log of saved prompts.
//!
//! Format is `timestamp,prompt` with a header row. A prompt identical to
//! the most recent entry is not written again; older duplicates are kept.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Result, StudioError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One logged prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Local time the prompt was logged, `YYYY-mm-dd HH:MM:SS`.
    pub timestamp: String,
    /// Prompt text.
    pub prompt: String,
}

/// CSV-backed prompt history.
#[derive(Debug)]
pub struct PromptHistory {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl PromptHistory {
    /// History stored at `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the CSV file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log `prompt` unless it equals the last entry.
    ///
    /// Returns `true` when a record was written.
    pub fn append(&self, prompt: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());

        let entries = self.read_all()?;
        if entries.last().is_some_and(|last| last.prompt == prompt) {
            debug!("skipping duplicate prompt in history");
            return Ok(false);
        }

        let needs_header = std::fs::metadata(&self.path).map_or(true, |m| m.len() == 0);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.storage_err("open", e))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer
            .serialize(HistoryEntry {
                timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
                prompt: prompt.to_owned(),
            })
            .map_err(|e| self.storage_err("write", e))?;
        writer.flush().map_err(|e| self.storage_err("flush", e))?;

        info!("logged prompt to {}", self.path.display());
        Ok(true)
    }

    /// Up to `n` entries, most recent first.
    pub fn last(&self, n: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self.read_all()?;
        Ok(entries.into_iter().rev().take(n).collect())
    }

    fn read_all(&self) -> Result<Vec<HistoryEntry>> {
        let mut reader = match csv::Reader::from_path(&self.path) {
            Ok(reader) => reader,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind() {
                    if io.kind() == std::io::ErrorKind::NotFound {
                        return Ok(Vec::new());
                    }
                }
                return Err(self.storage_err("open", e));
            }
        };

        reader
            .deserialize()
            .collect::<std::result::Result<Vec<HistoryEntry>, _>>()
            .map_err(|e| self.storage_err("parse", e))
    }

    fn storage_err(&self, action: &str, e: impl std::fmt::Display) -> StudioError {
        StudioError::Storage(format!(
            "cannot {action} prompt history {}: {e}",
            self.path.display()
        ))
    }
}
