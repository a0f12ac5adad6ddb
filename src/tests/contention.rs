// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::setup_tracing;
use crate::{LockManager, LockMode, Owner, ScopedRowLock};
use parking_lot::Mutex;
use std::sync::Barrier;
use std::thread;
use tracing::info;

const NUM_THREADS: usize = 10;
const NUM_ITERATIONS: usize = 1000;

/// A resource that detects two owners using it at the same time.
struct Resource {
    key: String,
    owner: Mutex<Option<Owner>>,
}

impl Resource {
    fn new(key: String) -> Resource {
        Resource {
            key,
            owner: Mutex::new(None),
        }
    }

    fn acquire(&self, owner: Owner) {
        let mut current = self.owner.lock();
        assert_eq!(*current, None, "{} is used by two owners", self.key);
        *current = Some(owner);
    }

    fn release(&self, owner: Owner) {
        let mut current = self.owner.lock();
        assert_eq!(*current, Some(owner));
        *current = None;
    }
}

/// Repeatedly locks the keys of the resources, and uses the resources while holding the locks.
fn run(lock_manager: &LockManager, resources: &[&Resource], barrier: &Barrier) {
    let owner = Owner::current_thread();
    let mut keys: Vec<&[u8]> = resources.iter().map(|r| r.key.as_bytes()).collect();
    keys.sort_unstable();
    barrier.wait();
    for _ in 0..NUM_ITERATIONS {
        let row_lock = ScopedRowLock::new(lock_manager, owner, &keys, LockMode::Exclusive);
        assert!(row_lock.acquired());
        for r in resources {
            r.acquire(owner);
        }
        for r in resources {
            r.release(owner);
        }
    }
}

#[test]
fn contended() {
    setup_tracing();
    let lock_manager = LockManager::new();
    let resource_a = Resource::new("a".to_string());
    let resource_b = Resource::new("b".to_string());
    let resource_c = Resource::new("c".to_string());
    let barrier = Barrier::new(NUM_THREADS);
    thread::scope(|s| {
        for i in 0..NUM_THREADS {
            // Keys are deliberately listed out of order; every thread sorts them before locking.
            let resources = match i % 3 {
                0 => [&resource_a, &resource_b],
                1 => [&resource_b, &resource_c],
                _ => [&resource_c, &resource_a],
            };
            let lock_manager = &lock_manager;
            let barrier = &barrier;
            s.spawn(move || run(lock_manager, &resources, barrier));
        }
    });

    let telemetry = lock_manager.telemetry();
    info!(?telemetry, "contended");
    assert_eq!(
        telemetry.acquired,
        u64::try_from(NUM_THREADS * NUM_ITERATIONS * 2).unwrap()
    );
    assert_eq!(lock_manager.num_entries(), 0);
}

#[test]
fn uncontended() {
    setup_tracing();
    let lock_manager = LockManager::new();
    let resources: Vec<Resource> = (0..NUM_THREADS)
        .map(|i| Resource::new(format!("slice{i:03}")))
        .collect();
    let barrier = Barrier::new(NUM_THREADS);
    thread::scope(|s| {
        for resource in &resources {
            let lock_manager = &lock_manager;
            let barrier = &barrier;
            s.spawn(move || run(lock_manager, &[resource], barrier));
        }
    });

    let telemetry = lock_manager.telemetry();
    info!(?telemetry, "uncontended");
    assert_eq!(telemetry.waited, 0);
    assert_eq!(telemetry.busy, 0);
    assert_eq!(lock_manager.num_entries(), 0);
}

#[test]
fn shared_owner_across_threads() {
    let lock_manager = LockManager::new();
    let owner = Owner::new(42);
    let outer = ScopedRowLock::new(&lock_manager, owner, &["a"], LockMode::Exclusive);
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..NUM_ITERATIONS {
                    let row_lock =
                        ScopedRowLock::new(&lock_manager, owner, &["a"], LockMode::Exclusive);
                    assert!(row_lock.acquired());
                }
            });
        }
    });
    assert_eq!(lock_manager.holder("a"), Some(owner));
    drop(outer);
    assert!(!lock_manager.is_locked("a"));
}
