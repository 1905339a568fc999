// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use rq_core::OpLog;
use tempfile::TempDir;
use yare::parameterized;

#[parameterized(
    sync = { SyncMode::Sync },
    async_mode = { SyncMode::Async },
    offline = { SyncMode::Offline },
)]
fn test_save_and_load(mode: SyncMode) {
    let dir = TempDir::new().unwrap();
    let meta = QueueMetadata::new(mode);
    meta.save(dir.path()).unwrap();

    let loaded = QueueMetadata::load(dir.path()).unwrap().unwrap();
    assert_eq!(loaded, meta);
    assert_eq!(loaded.pid, std::process::id());
}

#[test]
fn test_load_missing_is_none() {
    let dir = TempDir::new().unwrap();
    assert!(QueueMetadata::load(dir.path()).unwrap().is_none());
}

#[test]
fn test_load_garbage_is_corrupt() {
    let dir = TempDir::new().unwrap();
    fs::write(QueueMetadata::path_in(dir.path()), "{not json").unwrap();
    let err = QueueMetadata::load(dir.path()).unwrap_err();
    assert!(matches!(err, Error::CorruptState { .. }));
}

#[test]
fn test_mode_is_stored_in_kebab_case() {
    let dir = TempDir::new().unwrap();
    QueueMetadata::new(SyncMode::ReadOnly).save(dir.path()).unwrap();
    let raw = fs::read_to_string(QueueMetadata::path_in(dir.path())).unwrap();
    assert!(raw.contains("\"read-only\""));
}

#[test]
fn test_has_queue_state() {
    let dir = TempDir::new().unwrap();
    assert!(!has_queue_state(dir.path()));

    OpLog::open(dir.path(), 1024).unwrap();
    assert!(has_queue_state(dir.path()));
}
