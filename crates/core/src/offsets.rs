// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Persistent sync offsets for a queue directory.
//!
//! `offsets.json` records the highest appended sequence (`last_put`) and
//! the highest sequence the backend has confirmed (`last_ack`). Both only
//! move forward. Updates go through a temp file + rename so a crash leaves
//! either the old or the new offsets, never a mix.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::op::Seq;
use crate::oplog::peek_tail;

/// Filename of the offsets file inside a queue directory.
pub const OFFSETS_FILE: &str = "offsets.json";

/// Snapshot of the offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offsets {
    pub last_put: Seq,
    pub last_ack: Seq,
}

impl Offsets {
    /// Number of operations appended but not yet acknowledged.
    pub fn lag(&self) -> u64 {
        self.last_put.saturating_sub(self.last_ack)
    }
}

/// Reads and advances the offsets of one queue.
#[derive(Debug)]
pub struct OffsetTracker {
    path: PathBuf,
    current: Offsets,
}

impl OffsetTracker {
    /// Returns the offsets file path for a queue directory.
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(OFFSETS_FILE)
    }

    /// Reads offsets from `dir` without taking ownership of the queue.
    ///
    /// Returns `None` when no offsets file exists.
    pub fn peek(dir: &Path) -> Result<Option<Offsets>> {
        let path = Self::path_in(dir);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::corrupt(&path, format!("cannot read offsets: {e}"))),
        };
        let offsets: Offsets = serde_json::from_str(&content)
            .map_err(|e| Error::corrupt(&path, format!("unparsable offsets: {e}")))?;
        if offsets.last_ack > offsets.last_put {
            return Err(Error::corrupt(
                &path,
                format!(
                    "last_ack {} is ahead of last_put {}",
                    offsets.last_ack, offsets.last_put
                ),
            ));
        }
        Ok(Some(offsets))
    }

    /// Reads offsets from `dir` with `last_put` taken from the log tail.
    ///
    /// A writer keeps appends in memory until it flushes, so after a crash
    /// the stored `last_put` lags behind the log. Nothing is written.
    pub fn inspect(dir: &Path) -> Result<Offsets> {
        let stored = Self::peek(dir)?.unwrap_or_default();
        Ok(Offsets {
            last_put: stored.last_put.max(peek_tail(dir)?),
            last_ack: stored.last_ack,
        })
    }

    /// Opens the tracker for `dir`, reconciling it with the log tail.
    ///
    /// The log is authoritative for `last_put`: a tail ahead of the stored
    /// value means the process died between an append and the next offsets
    /// flush. A tail behind it means appended operations went missing.
    pub fn open(dir: &Path, log_tail: Seq) -> Result<Self> {
        let path = Self::path_in(dir);
        let stored = Self::peek(dir)?.unwrap_or_default();

        if log_tail < stored.last_put {
            return Err(Error::corrupt(
                &path,
                format!(
                    "offsets record {} appended operations but the log ends at {log_tail}",
                    stored.last_put
                ),
            ));
        }
        if stored.last_ack > log_tail {
            return Err(Error::corrupt(
                &path,
                format!(
                    "last_ack {} is ahead of the log tail {log_tail}",
                    stored.last_ack
                ),
            ));
        }

        let mut tracker = OffsetTracker {
            path,
            current: Offsets {
                last_put: log_tail,
                last_ack: stored.last_ack,
            },
        };
        if tracker.current != stored {
            tracker.persist()?;
        }
        Ok(tracker)
    }

    /// Returns the current offsets.
    pub fn read(&self) -> Offsets {
        self.current
    }

    /// Records a new append. Kept in memory until the next flush or ack.
    pub fn record_put(&mut self, seq: Seq) {
        if seq > self.current.last_put {
            self.current.last_put = seq;
        }
    }

    /// Advances `last_ack` and persists it.
    ///
    /// Values at or below the current `last_ack` are ignored. Returns
    /// whether the offsets moved.
    pub fn advance_ack(&mut self, seq: Seq) -> Result<bool> {
        let seq = seq.min(self.current.last_put);
        if seq <= self.current.last_ack {
            return Ok(false);
        }
        let previous = self.current.last_ack;
        self.current.last_ack = seq;
        if let Err(e) = self.persist() {
            self.current.last_ack = previous;
            return Err(e);
        }
        Ok(true)
    }

    /// Writes the in-memory offsets to disk.
    pub fn flush(&mut self) -> Result<()> {
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_string(&self.current)?;
        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };
        write().map_err(|e| Error::persistence(&self.path, e))
    }
}

#[cfg(test)]
#[path = "offsets_tests.rs"]
mod tests;
