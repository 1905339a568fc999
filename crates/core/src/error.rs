// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for rq-core operations.

use std::path::PathBuf;

use thiserror::Error;

/// All possible errors that can occur in rq-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A write or flush to local storage failed.
    ///
    /// Never retried: a metadata write that cannot be made durable must
    /// reach the caller.
    #[error("local persistence failure at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Queue files exist but cannot be trusted.
    #[error("corrupt local state at {}: {reason}\n  hint: the directory still holds the original files; inspect or move it aside before retrying", path.display())]
    CorruptState { path: PathBuf, reason: String },

    #[error("invalid attribute path '{0}'\n  hint: paths are non-empty '/'-separated segments, e.g. 'metrics/loss'")]
    InvalidPath(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wraps an I/O error raised while writing `path`.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Builds a corrupt-state error for `path`.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptState {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for rq-core operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
