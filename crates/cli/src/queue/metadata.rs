// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Descriptive `queue.json` file written when a queue is created.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mode::SyncMode;

/// Name of the metadata file inside a queue directory.
pub const METADATA_FILE: &str = "queue.json";

/// How and when a queue was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMetadata {
    pub mode: SyncMode,
    /// Process that created the queue.
    pub pid: u32,
    pub created_at: DateTime<Utc>,
}

impl QueueMetadata {
    /// Metadata for a queue created now by this process.
    pub fn new(mode: SyncMode) -> Self {
        QueueMetadata {
            mode,
            pid: std::process::id(),
            created_at: Utc::now(),
        }
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(METADATA_FILE)
    }

    /// Reads the metadata of `dir`, or `None` if it has none.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = Self::path_in(dir);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Persistence { path, source: e }),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| Error::CorruptState {
                path,
                reason: format!("unparsable queue metadata: {e}"),
            })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let path = Self::path_in(dir);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| Error::Persistence { path, source: e })
    }
}

/// Returns true if `dir` holds queue state worth resuming.
pub fn has_queue_state(dir: &Path) -> bool {
    if rq_core::OffsetTracker::path_in(dir).exists() {
        return true;
    }
    rq_core::oplog::list_segments(dir).is_ok_and(|segments| !segments.is_empty())
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
