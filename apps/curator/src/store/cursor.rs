use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppError;
use crate::store::{read_json, write_json_atomic};

/// Highest update sequence already handled. Never decreases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub last_sequence: i64,
}

impl Cursor {
    pub fn covers(&self, sequence: i64) -> bool {
        sequence <= self.last_sequence
    }
}

/// Cursor document on disk plus the in-memory value that may run ahead of it.
pub struct CursorStore {
    path: PathBuf,
    current: Cursor,
    persisted: Cursor,
}

impl CursorStore {
    /// Loads the stored cursor, starting at 0 when no document exists yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let stored: Cursor = read_json(&path)?.unwrap_or_default();
        Ok(Self {
            path,
            current: stored,
            persisted: stored,
        })
    }

    pub fn current(&self) -> Cursor {
        self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Moves the in-memory cursor forward. Lower values are ignored.
    pub fn advance(&mut self, sequence: i64) {
        if sequence > self.current.last_sequence {
            self.current.last_sequence = sequence;
        }
    }

    /// Writes the cursor if it moved since the last successful write.
    /// Returns whether a write happened.
    pub fn flush(&mut self) -> Result<bool, AppError> {
        if self.current.last_sequence <= self.persisted.last_sequence {
            return Ok(false);
        }
        write_json_atomic(&self.path, &self.current)?;
        self.persisted = self.current;
        debug!("Saved lastSequence = {}", self.current.last_sequence);
        Ok(true)
    }
}
