// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Manual upload of queues left on disk.

use std::path::{Path, PathBuf};

use crate::config::QueueConfig;
use crate::error::Result;
use crate::queue::SyncReport;
use crate::resync::{self, Progress};
use crate::sync::WebSocketSink;

pub async fn run(
    dirs: Vec<PathBuf>,
    url: String,
    run_id: Option<String>,
    timeout: Option<u64>,
    config: QueueConfig,
) -> Result<()> {
    let config = config.with_overrides(None, timeout);
    for dir in &dirs {
        let run_id = run_id.clone().unwrap_or_else(|| default_run_id(dir));
        let sink = WebSocketSink::new(url.clone(), run_id);
        println!("Syncing {}", dir.display());
        let report = resync::resync(dir, Box::new(sink), config.clone(), |p| {
            println!("  {}", format_progress(p))
        })
        .await?;
        println!("{}", format_report(dir, &report));
    }
    Ok(())
}

/// The run a queue belongs to when none is given: its directory name.
pub(crate) fn default_run_id(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "default".to_string())
}

pub(crate) fn format_progress(progress: Progress) -> String {
    format!("{}/{} operations synced", progress.done, progress.total)
}

pub(crate) fn format_report(dir: &Path, report: &SyncReport) -> String {
    let mut line = format!("Synced {} operations from {}", report.synced, dir.display());
    if report.rejected > 0 {
        line.push_str(&format!(" ({} rejected by the server)", report.rejected));
    }
    if report.remaining > 0 {
        line.push_str(&format!(", {} still pending", report.remaining));
    }
    line
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
