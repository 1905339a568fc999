// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Progress reporting for the final flush of a stopping queue.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

/// Awaits `drain` for at most `timeout`, reporting progress every `interval`.
///
/// `lag` is polled for the progress lines. Returns true if `drain`
/// completed with success before the deadline.
pub(super) async fn flush_with_progress<F, L>(
    drain: F,
    lag: L,
    dir: &Path,
    timeout: Duration,
    interval: Duration,
) -> bool
where
    F: Future<Output = bool>,
    L: Fn() -> u64,
{
    let total = lag();
    if total == 0 {
        return true;
    }
    tracing::info!(
        "Waiting for the remaining {total} operations to synchronize with the server. Do not kill this process."
    );

    let deadline = tokio::time::Instant::now() + timeout;
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.tick().await;
    tokio::pin!(drain);

    let synced = loop {
        tokio::select! {
            done = &mut drain => break done,
            _ = tokio::time::sleep_until(deadline) => break false,
            _ = ticker.tick() => {
                let remaining = lag();
                tracing::info!(
                    "Still waiting for the remaining {remaining} operations ({:.2}% done). Please wait.",
                    percent_done(total, remaining)
                );
            }
        }
    };

    let remaining = lag();
    if synced && remaining == 0 {
        tracing::info!("All {total} operations synced, thanks for waiting!");
        true
    } else {
        tracing::warn!(
            "Failed to sync all operations within {}s; {remaining} operations are saved on disk, run 'runq sync {}' to upload them",
            timeout.as_secs(),
            dir.display()
        );
        false
    }
}

fn percent_done(total: u64, remaining: u64) -> f64 {
    if total == 0 {
        return 100.0;
    }
    total.saturating_sub(remaining) as f64 * 100.0 / total as f64
}

#[cfg(test)]
#[path = "flush_tests.rs"]
mod tests;
