// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Maintenance of queues left on disk: manual resync, status and discovery.
//!
//! These work on directories written by other (possibly dead) processes.
//! `status` and `discover` only read; `resync` takes the queue lock like
//! any writer.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use rq_core::OffsetTracker;

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::mode::SyncMode;
use crate::queue::{has_queue_state, QueueLock, QueueMetadata, SyncQueue, SyncReport, METADATA_FILE};
use crate::sync::RemoteSink;

/// Snapshot of a queue directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub dir: PathBuf,
    /// Mode the queue was created with, if it has metadata.
    pub mode: Option<SyncMode>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_put: u64,
    pub last_ack: u64,
    pub unsynced: u64,
    /// Whether a live process owns the queue.
    pub locked: bool,
}

/// Progress of a running resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub done: u64,
    pub total: u64,
}

/// Reads the state of `dir` without taking ownership.
pub fn status(dir: &Path) -> Result<QueueStatus> {
    let meta = QueueMetadata::load(dir)?;
    if meta.is_none() && !has_queue_state(dir) {
        return Err(Error::NotAQueue(dir.to_path_buf()));
    }
    let offsets = OffsetTracker::inspect(dir)?;
    Ok(QueueStatus {
        dir: dir.to_path_buf(),
        mode: meta.as_ref().map(|m| m.mode),
        created_at: meta.map(|m| m.created_at),
        last_put: offsets.last_put,
        last_ack: offsets.last_ack,
        unsynced: offsets.lag(),
        locked: QueueLock::is_held(dir),
    })
}

/// Lists the queue directories directly under `base`, sorted by path.
///
/// A missing base directory has no queues.
pub fn discover(base: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() && path.join(METADATA_FILE).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Uploads everything left in `dir` through `sink`.
///
/// `progress` is called when the sync starts, every status interval, and
/// once at the end. The directory is removed once fully synced; otherwise
/// it is kept for another attempt.
pub async fn resync<F>(
    dir: &Path,
    sink: Box<dyn RemoteSink>,
    config: QueueConfig,
    mut progress: F,
) -> Result<SyncReport>
where
    F: FnMut(Progress),
{
    if !has_queue_state(dir) {
        return Err(Error::NotAQueue(dir.to_path_buf()));
    }
    let interval = config.status_interval().max(Duration::from_millis(1));
    let queue = SyncQueue::open(dir, SyncMode::Offline, None, config)?;
    let total = queue.lag();
    tracing::info!(dir = %dir.display(), total, "starting manual sync");

    let report = if total == 0 {
        Ok(SyncReport::default())
    } else {
        let report_progress = |progress: &mut F| {
            progress(Progress {
                done: total.saturating_sub(queue.lag()),
                total,
            });
        };
        report_progress(&mut progress);

        let sync = queue.sync(sink);
        tokio::pin!(sync);
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        let report = loop {
            tokio::select! {
                report = &mut sync => break report,
                _ = ticker.tick() => report_progress(&mut progress),
            }
        };
        report_progress(&mut progress);
        report
    };

    match report {
        Ok(report) if report.remaining == 0 => {
            queue.close_and_cleanup().await?;
            tracing::info!(dir = %dir.display(), synced = report.synced, "queue synced and removed");
            Ok(report)
        }
        Ok(report) => {
            queue.stop(Duration::ZERO).await?;
            Ok(report)
        }
        Err(e) => {
            queue.stop(Duration::ZERO).await?;
            Err(e)
        }
    }
}

#[cfg(test)]
#[path = "resync_tests.rs"]
mod tests;
