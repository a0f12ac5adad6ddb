// SPDX-FileCopyrightText: 2021 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::setup_tracing;
use crate::{LockManager, LockMode, Owner, ScopedRowLock, TryLockOutcome};
use std::sync::Barrier;
use std::thread;

const O1: Owner = Owner::new(1);
const O2: Owner = Owner::new(2);

#[test]
fn busy_until_released() {
    setup_tracing();
    let lock_manager = LockManager::new();
    let row_lock = ScopedRowLock::new(&lock_manager, O1, &["a"], LockMode::Exclusive);
    assert!(row_lock.acquired());

    let (outcome, batch) = lock_manager.try_lock("a", O2);
    assert_eq!(outcome, TryLockOutcome::Busy);
    assert!(batch.is_none());

    drop(row_lock);
    let (outcome, batch) = lock_manager.try_lock("a", O2);
    assert_eq!(outcome, TryLockOutcome::Acquired);
    assert!(batch.is_some());
}

#[test]
fn batch_busy_until_released() {
    setup_tracing();
    let lock_manager = LockManager::new();
    let keys = ["a", "b", "c"];
    let row_lock = ScopedRowLock::new(&lock_manager, O1, &keys, LockMode::Exclusive);
    for k in keys {
        assert_eq!(lock_manager.try_lock(k, O2).0, TryLockOutcome::Busy);
    }

    drop(row_lock);
    let batches: Vec<_> = keys
        .iter()
        .map(|k| {
            let (outcome, batch) = lock_manager.try_lock(k, O2);
            assert_eq!(outcome, TryLockOutcome::Acquired);
            batch
        })
        .collect();
    assert_eq!(lock_manager.num_entries(), 3);
    drop(batches);
    assert_eq!(lock_manager.num_entries(), 0);
}

#[test]
fn nested_overlapping_batches() {
    let lock_manager = LockManager::new();
    let outer = ScopedRowLock::new(&lock_manager, O1, &["a", "b"], LockMode::Exclusive);
    {
        let inner = ScopedRowLock::new(&lock_manager, O1, &["b", "c"], LockMode::Exclusive);
        assert!(inner.acquired());
        assert_eq!(lock_manager.telemetry().reentered, 1);
    }
    assert_eq!(lock_manager.holder("b"), Some(O1));
    assert!(!lock_manager.is_locked("c"));
    drop(outer);
    assert!(!lock_manager.is_locked("a"));
    assert!(!lock_manager.is_locked("b"));
}

#[test]
fn moved_lock_crosses_threads() {
    let lock_manager = LockManager::new();
    let mut row_lock = ScopedRowLock::new(&lock_manager, O1, &["a", "b"], LockMode::Exclusive);
    let moved_lock = row_lock.take();
    thread::scope(|s| {
        s.spawn(move || {
            assert!(moved_lock.acquired());
            assert_eq!(moved_lock.owner(), Some(O1));
        });
    });
    assert!(!row_lock.acquired());
    assert!(!lock_manager.is_locked("a"));
    assert!(!lock_manager.is_locked("b"));
}

#[test]
fn waiter_is_granted_on_release() {
    setup_tracing();
    let lock_manager = LockManager::new();
    let barrier = Barrier::new(2);
    let row_lock = ScopedRowLock::new(&lock_manager, O1, &["a", "b"], LockMode::Exclusive);
    thread::scope(|s| {
        let waiter = s.spawn(|| {
            barrier.wait();
            let row_lock = ScopedRowLock::new(&lock_manager, O2, &["b"], LockMode::Exclusive);
            assert!(row_lock.acquired());
            assert_eq!(lock_manager.holder("b"), Some(O2));
        });
        barrier.wait();
        lock_manager.wait_for_waiters("b", 1);
        assert_eq!(lock_manager.holder("b"), Some(O1));
        drop(row_lock);
        waiter.join().unwrap();
    });
    assert_eq!(lock_manager.num_entries(), 0);
    assert_eq!(lock_manager.telemetry().waited, 1);
}

#[test]
fn independent_managers() {
    let first = LockManager::new();
    let second = LockManager::new();
    let row_lock = ScopedRowLock::new(&first, O1, &["a"], LockMode::Exclusive);
    assert_eq!(second.try_lock("a", O2).0, TryLockOutcome::Acquired);
    assert!(row_lock.acquired());
    assert_eq!(first.try_lock("a", O2).0, TryLockOutcome::Busy);
}
