// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Operating modes of a queue.
//!
//! The mode is fixed when a queue is opened and decides who drains it:
//! the producer inline, a background consumer, or nobody until a manual
//! sync.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How operations appended to a queue reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Every enqueue waits until its operation is acknowledged.
    Sync,
    /// Enqueue returns after the local append; a background task drains.
    Async,
    /// Operations are persisted only, for a later manual sync.
    Offline,
    /// No mutation allowed.
    ReadOnly,
    /// Operations are dropped without touching the disk.
    Debug,
}

impl SyncMode {
    /// Returns true if the mode sends operations on its own.
    pub fn requires_sink(self) -> bool {
        matches!(self, SyncMode::Sync | SyncMode::Async)
    }

    /// Returns true if enqueued operations are written to disk.
    pub fn persists(self) -> bool {
        !matches!(self, SyncMode::Debug | SyncMode::ReadOnly)
    }

    /// Returns true if `enqueue` is allowed.
    pub fn accepts_writes(self) -> bool {
        self != SyncMode::ReadOnly
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncMode::Sync => "sync",
            SyncMode::Async => "async",
            SyncMode::Offline => "offline",
            SyncMode::ReadOnly => "read-only",
            SyncMode::Debug => "debug",
        };
        f.write_str(s)
    }
}

impl FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(SyncMode::Sync),
            "async" => Ok(SyncMode::Async),
            "offline" => Ok(SyncMode::Offline),
            "read-only" | "read_only" => Ok(SyncMode::ReadOnly),
            "debug" => Ok(SyncMode::Debug),
            other => Err(Error::Config(format!(
                "unknown mode '{other}' (expected sync, async, offline, read-only or debug)"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "mode_tests.rs"]
mod tests;
