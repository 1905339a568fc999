// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod clear;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};

use crate::config::default_base_dir;
use crate::error::Result;

/// Resolves the directories a command works on.
///
/// Explicit directories win; otherwise every queue under `base` (or the
/// default base directory) is used.
pub fn resolve_dirs(dirs: Vec<PathBuf>, base: Option<&Path>) -> Result<Vec<PathBuf>> {
    if !dirs.is_empty() {
        return Ok(dirs);
    }
    let base = base.map_or_else(default_base_dir, Path::to_path_buf);
    crate::resync::discover(&base)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
