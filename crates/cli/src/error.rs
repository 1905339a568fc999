// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

use crate::mode::SyncMode;

/// All possible errors that can occur in the runq library.
///
/// Errors provide user-friendly messages with hints for common issues.
#[derive(Debug, Error)]
pub enum Error {
    #[error("local persistence failure at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt local state at {}: {reason}\n  hint: the directory still holds the original files; inspect or move it aside before retrying", path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error("invalid attribute path '{0}'")]
    InvalidPath(String),

    #[error("could not reach the server; {unsynced} operations remain saved on disk\n  hint: run 'runq sync <dir>' once the server is reachable")]
    ReconnectTimeout { unsynced: u64 },

    #[error("queue at {} is in use by another process", path.display())]
    QueueLocked { path: PathBuf },

    #[error("queue is read-only")]
    ReadOnly,

    #[error("mode '{mode}' {reason}")]
    InvalidMode { mode: SyncMode, reason: &'static str },

    #[error("{unsynced} operations are not synced yet\n  hint: sync the queue first, or discard it with 'runq clear --force'")]
    NotSynced { unsynced: u64 },

    #[error("queue has been stopped")]
    Stopped,

    #[error("not a queue directory: {}", .0.display())]
    NotAQueue(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

/// A specialized Result type for runq operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<rq_core::Error> for Error {
    fn from(e: rq_core::Error) -> Self {
        match e {
            rq_core::Error::Persistence { path, source } => Error::Persistence { path, source },
            rq_core::Error::CorruptState { path, reason } => Error::CorruptState { path, reason },
            rq_core::Error::InvalidPath(p) => Error::InvalidPath(p),
            rq_core::Error::Io(e) => Error::Io(e),
            rq_core::Error::Json(e) => Error::Json(e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
