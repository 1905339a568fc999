// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access.
//!
//! All runtime environment variables used by runq are defined here
//! with typed accessor functions. The variable name constants are generated
//! by `build.rs` and live in the [`vars`] submodule.

use std::path::PathBuf;
use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Generated environment variable name constants.
pub mod vars {
    include!(concat!(env!("OUT_DIR"), "/env_vars.rs"));
}

/// Returns the value of `RUNQ_DATA_DIR` if set and non-empty.
pub fn data_dir() -> Option<PathBuf> {
    std::env::var(vars::RUNQ_DATA_DIR)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns the value of `RUNQ_CONFIG` if set and non-empty.
pub fn config_file() -> Option<PathBuf> {
    std::env::var(vars::RUNQ_CONFIG)
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Returns `RUNQ_MAX_BATCH_SIZE_BYTES` parsed as a byte count.
pub fn max_batch_size_bytes() -> Option<usize> {
    parsed(vars::RUNQ_MAX_BATCH_SIZE_BYTES)
}

/// Returns `RUNQ_SYNC_AFTER_STOP_TIMEOUT` parsed as seconds.
pub fn sync_after_stop_timeout() -> Option<u64> {
    parsed(vars::RUNQ_SYNC_AFTER_STOP_TIMEOUT)
}

/// Returns the log filter from `RUST_LOG`, or `default` when unset or invalid.
pub fn log_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(vars::RUST_LOG).unwrap_or_else(|_| EnvFilter::new(default))
}

fn parsed<T: FromStr>(name: &str) -> Option<T> {
    parse_value(name, std::env::var(name).ok())
}

/// Parses an optional raw value, logging and ignoring values that do not parse.
pub(crate) fn parse_value<T: FromStr>(name: &str, raw: Option<String>) -> Option<T> {
    let raw = raw?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparsable environment variable");
            None
        }
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
