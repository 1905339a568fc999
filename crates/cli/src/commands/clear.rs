// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use crate::config::QueueConfig;
use crate::error::{Error, Result};
use crate::mode::SyncMode;
use crate::queue::{has_queue_state, SyncQueue};

pub async fn run(dirs: Vec<PathBuf>, force: bool, config: QueueConfig) -> Result<()> {
    for dir in dirs {
        if !has_queue_state(&dir) {
            return Err(Error::NotAQueue(dir));
        }
        let queue = SyncQueue::open(&dir, SyncMode::Offline, None, config.clone())?;
        let unsynced = queue.lag();
        if force {
            queue.discard().await?;
        } else {
            queue.close_and_cleanup().await?;
        }

        if unsynced > 0 {
            println!(
                "Removed {} ({unsynced} unsynced operations discarded)",
                dir.display()
            );
        } else {
            println!("Removed {}", dir.display());
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "clear_tests.rs"]
mod tests;
