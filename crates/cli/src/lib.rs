// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! runq - A durable local queue for run metadata.
//!
//! Every change to a run's metadata is appended to an operation log on disk
//! before anything else happens to it. A sync engine then moves the log to
//! the server in ordered, acknowledged batches, so metadata survives
//! network outages and process crashes.
//!
//! # Main Components
//!
//! - [`SyncQueue`] - Opens a queue directory and returns a [`QueueHandle`]
//! - [`SyncMode`] - Who drains the queue: the producer, a background task, or nobody
//! - [`sync`] - The consumer loop, batching, backoff and the [`RemoteSink`] trait
//! - [`QueueConfig`] - Tuning knobs, from TOML and environment
//! - [`Error`] - Error types for all operations
//!
//! # Usage
//!
//! ```rust,ignore
//! use runq::{QueueConfig, SyncMode, SyncQueue, WebSocketSink};
//! use rq_core::{AttributePath, PendingOperation};
//!
//! let sink = WebSocketSink::new("ws://localhost:7890", "run-1");
//! let queue = SyncQueue::open(dir, SyncMode::Async, Some(Box::new(sink)), QueueConfig::default())?;
//! queue.enqueue(PendingOperation::assign(AttributePath::parse("params/lr")?, 0.01.into())).await?;
//! queue.stop(Duration::from_secs(30)).await?;
//! ```

mod cli;
mod commands;
mod mode;

pub mod config;
pub mod env;
pub mod error;
pub mod queue;
pub mod resync;
pub mod sync;

pub use cli::{Cli, Command, OutputFormat};
pub use config::QueueConfig;
pub use error::{Error, Result};
pub use mode::SyncMode;
pub use queue::{Producer, QueueHandle, SyncQueue, SyncReport};
pub use resync::{Progress, QueueStatus};
pub use sync::{RemoteSink, SyncEvent, WebSocketSink};

/// Execute a CLI command. This is the main entry point for library users
/// and provides a testable way to run commands without process execution.
pub fn run(cli: Cli) -> Result<()> {
    let config = QueueConfig::resolve(cli.config.as_deref())?;
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Io(std::io::Error::other(format!("tokio: {}", e))))?;
    rt.block_on(dispatch(cli.command, config))
}

async fn dispatch(command: Command, config: QueueConfig) -> Result<()> {
    match command {
        Command::Status { dirs, base, output } => {
            commands::status::run(dirs, base.as_deref(), output)
        }
        Command::Sync {
            dirs,
            url,
            run_id,
            timeout,
        } => commands::sync::run(dirs, url, run_id, timeout, config).await,
        Command::Clear { dirs, force } => commands::clear::run(dirs, force, config).await,
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
