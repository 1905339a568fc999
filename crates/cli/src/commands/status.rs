// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::resync::{self, QueueStatus};

pub fn run(dirs: Vec<PathBuf>, base: Option<&Path>, output: OutputFormat) -> Result<()> {
    let dirs = super::resolve_dirs(dirs, base)?;
    let statuses = dirs
        .iter()
        .map(|dir| resync::status(dir))
        .collect::<Result<Vec<_>>>()?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&statuses)?),
        OutputFormat::Text => {
            if statuses.is_empty() {
                println!("No queues found.");
            }
            for status in &statuses {
                println!("{}", format_status(status));
            }
        }
    }
    Ok(())
}

/// One line per queue, e.g. `.runq/run-1  offline  3 of 10 unsynced`.
pub(crate) fn format_status(status: &QueueStatus) -> String {
    let mode = status
        .mode
        .map_or_else(|| "unknown".to_string(), |m| m.to_string());
    let sync = if status.unsynced == 0 {
        format!("synced ({} operations)", status.last_put)
    } else {
        format!("{} of {} unsynced", status.unsynced, status.last_put)
    };
    let locked = if status.locked { "  (in use)" } else { "" };
    format!("{}  {mode}  {sync}{locked}", status.dir.display())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
