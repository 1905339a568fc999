// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use super::*;
use tempfile::TempDir;

#[test]
fn test_second_acquire_is_refused() {
    let dir = TempDir::new().unwrap();
    let lock = QueueLock::acquire(dir.path()).unwrap();

    match QueueLock::acquire(dir.path()) {
        Err(Error::QueueLocked { path }) => assert_eq!(path, dir.path()),
        other => panic!("expected QueueLocked, got {other:?}"),
    }
    drop(lock);
}

#[test]
fn test_release_allows_reacquire() {
    let dir = TempDir::new().unwrap();
    QueueLock::acquire(dir.path()).unwrap().release();
    assert!(QueueLock::acquire(dir.path()).is_ok());
}

#[test]
fn test_drop_releases() {
    let dir = TempDir::new().unwrap();
    drop(QueueLock::acquire(dir.path()).unwrap());
    assert!(QueueLock::acquire(dir.path()).is_ok());
}

#[test]
fn test_is_held() {
    let dir = TempDir::new().unwrap();
    assert!(!QueueLock::is_held(dir.path()));

    let lock = QueueLock::acquire(dir.path()).unwrap();
    assert!(QueueLock::is_held(dir.path()));

    lock.release();
    assert!(!QueueLock::is_held(dir.path()));
}

#[test]
fn test_missing_directory_is_persistence_error() {
    let dir = TempDir::new().unwrap();
    let err = QueueLock::acquire(&dir.path().join("missing")).unwrap_err();
    assert!(matches!(err, Error::Persistence { .. }));
}
