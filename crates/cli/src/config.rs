// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Queue tuning configuration.
//!
//! Every knob has a default, so an empty file (or no file at all) is a valid
//! configuration. Configuration is read from, in order of precedence:
//! - an explicit path (`--config` or `RUNQ_CONFIG`)
//! - `<user config dir>/runq/config.toml`
//! - built-in defaults
//!
//! `RUNQ_MAX_BATCH_SIZE_BYTES` and `RUNQ_SYNC_AFTER_STOP_TIMEOUT` override
//! the corresponding file values.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::env;
use crate::error::{Error, Result};
use crate::sync::{BackpressurePolicy, BatchPolicy};

const DEFAULT_BASE_DIR: &str = ".runq";
const CONFIG_DIR_NAME: &str = "runq";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Tuning parameters of a queue and its sync loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Operations in the first batch after start or after a failure.
    #[serde(default = "default_initial_batch_size")]
    pub initial_batch_size: usize,
    /// Multiplier applied to the batch size after each successful send.
    #[serde(default = "default_batch_growth_factor")]
    pub batch_growth_factor: f64,
    /// Upper bound on operations per batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Upper bound on serialized bytes per batch.
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,
    /// Size after which the log starts a new segment file.
    #[serde(default = "default_max_segment_bytes")]
    pub max_segment_bytes: u64,
    /// Bound on a single send; expiry counts as a transient failure.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// First retry delay after a transient failure.
    #[serde(default = "default_backoff_initial_ms")]
    pub backoff_initial_ms: u64,
    /// Cap on the retry delay.
    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,
    /// Total time to keep retrying before giving up.
    #[serde(default = "default_max_reconnect_wait_secs")]
    pub max_reconnect_wait_secs: u64,
    /// How often an idle consumer re-checks the log without a wakeup.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Interval of progress messages while stopping.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    /// Lag (unacknowledged operations) considered large.
    #[serde(default = "default_lag_threshold")]
    pub lag_threshold: u64,
    /// How long lag must stay above the threshold before it is reported.
    #[serde(default = "default_lag_duration_secs")]
    pub lag_duration_secs: u64,
    /// Time without any acknowledgement, while lag > 0, reported as no progress.
    #[serde(default = "default_no_progress_secs")]
    pub no_progress_secs: u64,
    /// Minimum interval between two reports of the same condition.
    #[serde(default = "default_callback_interval_secs")]
    pub callback_interval_secs: u64,
    /// What producers do while lag is above the threshold.
    #[serde(default)]
    pub backpressure: BackpressurePolicy,
    /// Longest a producer is held back under [`BackpressurePolicy::Block`].
    #[serde(default = "default_block_timeout_secs")]
    pub block_timeout_secs: u64,
    /// Remove fully acknowledged log segments.
    #[serde(default = "default_trim_acknowledged")]
    pub trim_acknowledged: bool,
}

fn default_initial_batch_size() -> usize {
    16
}

fn default_batch_growth_factor() -> f64 {
    2.0
}

fn default_max_batch_size() -> usize {
    1000
}

fn default_max_batch_bytes() -> usize {
    100 * 1024 * 1024
}

fn default_max_segment_bytes() -> u64 {
    rq_core::DEFAULT_MAX_SEGMENT_BYTES
}

fn default_request_timeout_ms() -> u64 {
    60_000
}

fn default_backoff_initial_ms() -> u64 {
    2_000
}

fn default_backoff_max_ms() -> u64 {
    120_000
}

fn default_max_reconnect_wait_secs() -> u64 {
    300
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_status_interval_secs() -> u64 {
    30
}

fn default_lag_threshold() -> u64 {
    10_000
}

fn default_lag_duration_secs() -> u64 {
    60
}

fn default_no_progress_secs() -> u64 {
    300
}

fn default_callback_interval_secs() -> u64 {
    300
}

fn default_block_timeout_secs() -> u64 {
    60
}

fn default_trim_acknowledged() -> bool {
    true
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            initial_batch_size: default_initial_batch_size(),
            batch_growth_factor: default_batch_growth_factor(),
            max_batch_size: default_max_batch_size(),
            max_batch_bytes: default_max_batch_bytes(),
            max_segment_bytes: default_max_segment_bytes(),
            request_timeout_ms: default_request_timeout_ms(),
            backoff_initial_ms: default_backoff_initial_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            max_reconnect_wait_secs: default_max_reconnect_wait_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            status_interval_secs: default_status_interval_secs(),
            lag_threshold: default_lag_threshold(),
            lag_duration_secs: default_lag_duration_secs(),
            no_progress_secs: default_no_progress_secs(),
            callback_interval_secs: default_callback_interval_secs(),
            backpressure: BackpressurePolicy::default(),
            block_timeout_secs: default_block_timeout_secs(),
            trim_acknowledged: default_trim_acknowledged(),
        }
    }
}

impl QueueConfig {
    /// Loads configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parses configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        let config: QueueConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolves the effective configuration.
    ///
    /// An explicit path must exist; the per-user file is optional.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let explicit = explicit.map(Path::to_path_buf).or_else(env::config_file);
        let config = match explicit {
            Some(path) => Self::load(&path)?,
            None => match user_config_path() {
                Some(path) if path.is_file() => Self::load(&path)?,
                _ => Self::default(),
            },
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Applies the environment overrides.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(env::max_batch_size_bytes(), env::sync_after_stop_timeout())
    }

    /// Applies override values where present.
    pub fn with_overrides(
        mut self,
        max_batch_bytes: Option<usize>,
        max_reconnect_wait_secs: Option<u64>,
    ) -> Self {
        if let Some(bytes) = max_batch_bytes {
            self.max_batch_bytes = bytes;
        }
        if let Some(secs) = max_reconnect_wait_secs {
            self.max_reconnect_wait_secs = secs;
        }
        self
    }

    /// Checks that the values are usable together.
    pub fn validate(&self) -> Result<()> {
        if self.initial_batch_size == 0 {
            return Err(Error::Config("initial_batch_size must be at least 1".into()));
        }
        if self.max_batch_size < self.initial_batch_size {
            return Err(Error::Config(
                "max_batch_size must not be smaller than initial_batch_size".into(),
            ));
        }
        if self.batch_growth_factor.is_nan() || self.batch_growth_factor < 1.0 {
            return Err(Error::Config("batch_growth_factor must be at least 1.0".into()));
        }
        if self.max_batch_bytes == 0 {
            return Err(Error::Config("max_batch_bytes must be positive".into()));
        }
        if self.max_segment_bytes == 0 {
            return Err(Error::Config("max_segment_bytes must be positive".into()));
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(Error::Config(
                "backoff_max_ms must not be smaller than backoff_initial_ms".into(),
            ));
        }
        Ok(())
    }

    /// Returns the batching policy.
    pub fn batch_policy(&self) -> BatchPolicy {
        BatchPolicy {
            initial_size: self.initial_batch_size,
            growth_factor: self.batch_growth_factor,
            max_size: self.max_batch_size,
            max_bytes: self.max_batch_bytes,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }

    pub fn max_reconnect_wait(&self) -> Duration {
        Duration::from_secs(self.max_reconnect_wait_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }

    pub fn lag_duration(&self) -> Duration {
        Duration::from_secs(self.lag_duration_secs)
    }

    pub fn no_progress(&self) -> Duration {
        Duration::from_secs(self.no_progress_secs)
    }

    pub fn callback_interval(&self) -> Duration {
        Duration::from_secs(self.callback_interval_secs)
    }

    pub fn block_timeout(&self) -> Duration {
        Duration::from_secs(self.block_timeout_secs)
    }
}

/// Returns the per-user configuration file path, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Returns the directory queues are created under by default.
///
/// `RUNQ_DATA_DIR` if set, otherwise `.runq` in the working directory.
pub fn default_base_dir() -> PathBuf {
    env::data_dir().unwrap_or_else(|| PathBuf::from(DEFAULT_BASE_DIR))
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
