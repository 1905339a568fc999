// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Exclusive ownership of a queue directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{Error, Result};

/// Name of the lock file inside a queue directory.
pub const LOCK_FILE: &str = "queue.lock";

/// Advisory lock held for as long as a writer owns the directory.
///
/// The OS drops the lock when the owning process dies, so a directory left
/// behind by a crashed writer can be opened again right away.
#[derive(Debug)]
pub struct QueueLock {
    file: File,
    path: PathBuf,
}

impl QueueLock {
    /// Takes the lock of `dir` without blocking.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::Persistence {
                path: path.clone(),
                source: e,
            })?;
        file.try_lock_exclusive().map_err(|_| Error::QueueLocked {
            path: dir.to_path_buf(),
        })?;
        tracing::debug!(path = %path.display(), "acquired queue lock");
        Ok(QueueLock { file, path })
    }

    /// Returns true if another handle currently holds the lock of `dir`.
    pub fn is_held(dir: &Path) -> bool {
        let Ok(file) = File::open(dir.join(LOCK_FILE)) else {
            return false;
        };
        match file.try_lock_shared() {
            Ok(()) => {
                let _ = file.unlock();
                false
            }
            Err(_) => true,
        }
    }

    pub fn release(self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "cannot release queue lock");
        }
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
