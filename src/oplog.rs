// SPDX-License-Identifier: MIT

//! Replayable operation log
//!
//! Every rename or copy the engine performs is appended as one JSON line, so
//! a batch can be rolled back even after the process exits. The log is the
//! single source of truth for undo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;

/// How the engine materialized the new name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    /// Original left in place, a named copy created elsewhere.
    Copied,
    /// Original moved to the new name.
    Renamed,
}

/// One applied operation, exactly as needed to reverse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationLogEntry {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
    pub action: ActionKind,
    pub timestamp: DateTime<Utc>,
}

impl OperationLogEntry {
    pub fn new(old_path: PathBuf, new_path: PathBuf, action: ActionKind) -> Self {
        Self {
            old_path,
            new_path,
            action,
            timestamp: Utc::now(),
        }
    }
}

/// Append-only JSONL log on disk.
pub struct OperationLog {
    path: PathBuf,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry. Called after the filesystem action succeeds.
    pub fn append(&self, entry: &OperationLogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Read all entries in file order. Unparseable lines are skipped with a
    /// warning so one corrupt record cannot block a rollback.
    pub fn read_all(&self) -> Result<Vec<OperationLogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(
                    "skipping corrupt log line {} in {}: {}",
                    number + 1,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }

    /// Remove the log file entirely.
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}
