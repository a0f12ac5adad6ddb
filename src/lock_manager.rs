// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::lock_entry::{Grant, TryLockOutcome};
use super::lock_table::{EntryRef, LockTable};
use super::telemetry::{Telemetry, TelemetrySnapshot};
use super::{Config, Error, Owner};
use std::collections::HashSet;
use std::ptr;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering::SeqCst;
use tracing::{debug, info};

/// [`LockManager`] serializes mutations to the same row while letting unrelated rows proceed.
///
/// Row keys are arbitrary byte sequences, and locks are owned by an [`Owner`]. A lock is
/// reentrant: an owner may acquire a key it already holds, and every acquisition has to be
/// released before another owner can be granted the key. Blocked requests for a key are served in
/// arrival order by handing the lock over to the oldest waiter when the key is released.
///
/// The manager does not detect deadlocks. Callers locking more than one key in a batch must
/// acquire keys in the same global order, e.g., ascending key order; otherwise two batches
/// locking overlapping keys in different orders may wait for each other forever.
#[derive(Debug)]
pub struct LockManager {
    /// The row key to lock entry map.
    table: LockTable,

    /// Statistics.
    telemetry: Telemetry,

    /// `true` once [`shutdown`](Self::shutdown) has been called.
    closed: AtomicBool,
}

/// Lock modes.
///
/// Only exclusive locks are defined; the type exists so that more modes can be introduced later.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[non_exhaustive]
pub enum LockMode {
    /// No other owner can hold the key at the same time.
    #[default]
    Exclusive,
}

/// [`LockBatch`] is a set of row locks acquired by an [`Owner`] in one go.
///
/// It holds one acquisition for each distinct key, and releases all of them when it is dropped
/// unless [`unlock`](Self::unlock) was called before.
#[derive(Debug)]
#[must_use = "the locks are released immediately if the batch is dropped"]
pub struct LockBatch<'m> {
    /// The manager that granted the locks.
    manager: &'m LockManager,

    /// The owner of the locks.
    owner: Owner,

    /// The lock mode.
    mode: LockMode,

    /// Acquired entries in acquisition order.
    entries: Vec<EntryRef>,

    /// `true` if the locks have been released.
    released: bool,
}

impl LockManager {
    /// Creates a new [`LockManager`] with the default [`Config`].
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::LockManager;
    ///
    /// let lock_manager = LockManager::new();
    /// assert_eq!(lock_manager.num_entries(), 0);
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> LockManager {
        LockManager::from_valid_config(&Config::default())
    }

    /// Creates a new [`LockManager`] with the supplied [`Config`].
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] if the configuration is invalid.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{Config, LockManager};
    ///
    /// assert!(LockManager::with_config(Config { num_shards: 4 }).is_ok());
    /// assert!(LockManager::with_config(Config { num_shards: 0 }).is_err());
    /// ```
    #[inline]
    pub fn with_config(config: Config) -> Result<LockManager, Error> {
        config.validate()?;
        Ok(LockManager::from_valid_config(&config))
    }

    /// Tries to lock a single key without blocking.
    ///
    /// Returns [`TryLockOutcome::Busy`] and no batch if another owner holds the key. Otherwise,
    /// the returned [`LockBatch`] holds the key until it is unlocked or dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{LockManager, Owner, TryLockOutcome};
    ///
    /// let lock_manager = LockManager::new();
    /// let (outcome, batch) = lock_manager.try_lock("a", Owner::new(1));
    /// assert_eq!(outcome, TryLockOutcome::Acquired);
    ///
    /// let (outcome, other) = lock_manager.try_lock("a", Owner::new(2));
    /// assert_eq!(outcome, TryLockOutcome::Busy);
    /// assert!(other.is_none());
    ///
    /// drop(batch);
    /// assert!(lock_manager.try_lock("a", Owner::new(2)).1.is_some());
    /// ```
    #[inline]
    pub fn try_lock<K: AsRef<[u8]>>(
        &self,
        key: K,
        owner: Owner,
    ) -> (TryLockOutcome, Option<LockBatch<'_>>) {
        let entry_ref = self.table.resolve(key.as_ref(), &self.telemetry);
        let outcome = entry_ref.entry().try_acquire(owner);
        match outcome {
            TryLockOutcome::Acquired => self.telemetry.on_acquired(),
            TryLockOutcome::AlreadyLockedBySelf => self.telemetry.on_reentered(),
            TryLockOutcome::Busy => {
                self.telemetry.on_busy();
                self.table.release_reference(entry_ref, &self.telemetry);
                return (outcome, None);
            }
        }
        let mut batch = LockBatch::new(self, owner, LockMode::Exclusive, 1);
        batch.entries.push(entry_ref);
        (outcome, Some(batch))
    }

    /// Locks every key in the supplied sequence, waiting for other owners if needed.
    ///
    /// Keys are locked one by one in the supplied order, and duplicate keys are locked only once.
    /// Keys that were locked earlier in the batch stay locked while the batch is waiting for a
    /// key held by another owner. Keys that the owner already holds are acquired again
    /// immediately.
    ///
    /// In order to avoid deadlocks, all the callers must sort the keys in the same order before
    /// passing them to this method.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShuttingDown`] if the manager is shut down before all the keys are
    /// locked; in that case, none of the keys remain locked by this call.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{LockManager, LockMode, Owner, TryLockOutcome};
    ///
    /// let lock_manager = LockManager::new();
    /// let batch = lock_manager.lock(&["a", "b", "c"], Owner::new(1), LockMode::Exclusive).unwrap();
    /// assert_eq!(batch.len(), 3);
    /// assert_eq!(lock_manager.try_lock("b", Owner::new(2)).0, TryLockOutcome::Busy);
    ///
    /// lock_manager.unlock(batch);
    /// assert!(!lock_manager.is_locked("b"));
    /// ```
    #[inline]
    pub fn lock<K: AsRef<[u8]>>(
        &self,
        keys: &[K],
        owner: Owner,
        mode: LockMode,
    ) -> Result<LockBatch<'_>, Error> {
        match mode {
            LockMode::Exclusive => (),
        }

        let mut batch = LockBatch::new(self, owner, mode, keys.len());
        let mut seen: HashSet<&[u8]> = HashSet::with_capacity(keys.len());
        for key in keys {
            let key = key.as_ref();
            if !seen.insert(key) {
                continue;
            }
            if self.closed.load(SeqCst) {
                debug!(?owner, acquired = batch.len(), "row lock batch aborted");
                return Err(Error::ShuttingDown);
            }

            let entry_ref = self.table.resolve(key, &self.telemetry);
            match entry_ref.entry().acquire_blocking(owner, &self.closed) {
                Ok(Grant::Free) => self.telemetry.on_acquired(),
                Ok(Grant::Reentrant) => self.telemetry.on_reentered(),
                Ok(Grant::HandedOff) => {
                    self.telemetry.on_waited();
                    self.telemetry.on_acquired();
                }
                Err(error) => {
                    self.table.release_reference(entry_ref, &self.telemetry);
                    debug!(?owner, acquired = batch.len(), "row lock batch aborted");
                    return Err(error);
                }
            }
            batch.entries.push(entry_ref);
        }
        Ok(batch)
    }

    /// Releases every lock in the batch.
    ///
    /// # Panics
    ///
    /// Panics if the batch was granted by a different [`LockManager`].
    #[inline]
    pub fn unlock(&self, mut batch: LockBatch<'_>) {
        assert!(
            ptr::eq(self, batch.manager),
            "row lock batch unlocked through a foreign lock manager"
        );
        batch.unlock();
    }

    /// Returns the owner that currently holds the key.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{LockManager, Owner};
    ///
    /// let lock_manager = LockManager::new();
    /// assert_eq!(lock_manager.holder("a"), None);
    ///
    /// let (_, batch) = lock_manager.try_lock("a", Owner::new(1));
    /// assert_eq!(lock_manager.holder("a"), Some(Owner::new(1)));
    /// ```
    #[inline]
    pub fn holder<K: AsRef<[u8]>>(&self, key: K) -> Option<Owner> {
        self.table.holder(key.as_ref())
    }

    /// Returns `true` if any owner holds the key.
    #[inline]
    pub fn is_locked<K: AsRef<[u8]>>(&self, key: K) -> bool {
        self.holder(key).is_some()
    }

    /// Blocks until the given number of owners are waiting for the key.
    #[cfg(test)]
    pub(crate) fn wait_for_waiters<K: AsRef<[u8]>>(&self, key: K, num_waiters: usize) {
        while self.table.num_waiters(key.as_ref()) != num_waiters {
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
    }

    /// Shuts down the [`LockManager`].
    ///
    /// Every blocked [`lock`](Self::lock) call fails, and so do all future ones. Locks that were
    /// acquired before stay held until released.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{Error, LockManager, LockMode, Owner};
    ///
    /// let lock_manager = LockManager::new();
    /// lock_manager.shutdown();
    /// assert!(lock_manager.is_shut_down());
    /// assert_eq!(
    ///     lock_manager.lock(&["a"], Owner::new(1), LockMode::Exclusive).err(),
    ///     Some(Error::ShuttingDown)
    /// );
    /// ```
    #[inline]
    pub fn shutdown(&self) {
        if self.closed.swap(true, SeqCst) {
            return;
        }
        let mut num_aborted = 0;
        self.table
            .for_each_entry(|entry| num_aborted += entry.abort_waiters());
        info!(num_aborted, "lock manager shut down");
    }

    /// Returns `true` if [`shutdown`](Self::shutdown) has been called.
    #[inline]
    pub fn is_shut_down(&self) -> bool {
        self.closed.load(SeqCst)
    }

    /// Returns the number of lock entries in the table.
    ///
    /// An entry exists while a key is locked, or while a call is operating on the key.
    #[inline]
    pub fn num_entries(&self) -> usize {
        self.table.len()
    }

    /// Returns a copy of the lock manager statistics.
    #[inline]
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }

    fn from_valid_config(config: &Config) -> LockManager {
        LockManager {
            table: LockTable::new(config.num_shards),
            telemetry: Telemetry::default(),
            closed: AtomicBool::new(false),
        }
    }
}

impl Default for LockManager {
    #[inline]
    fn default() -> Self {
        LockManager::new()
    }
}

impl<'m> LockBatch<'m> {
    /// Returns the owner of the locks.
    #[inline]
    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Returns the lock mode.
    #[inline]
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Returns the number of locked keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no keys are locked by the batch.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over the locked keys in acquisition order.
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.entries.iter().map(EntryRef::key)
    }

    /// Returns `true` if the locks have been released.
    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Releases every lock in the batch.
    ///
    /// Calling it more than once has no effect.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{LockManager, LockMode, Owner};
    ///
    /// let lock_manager = LockManager::new();
    /// let mut batch = lock_manager.lock(&["a"], Owner::new(1), LockMode::Exclusive).unwrap();
    /// batch.unlock();
    /// assert!(batch.is_released());
    /// batch.unlock();
    /// assert!(!lock_manager.is_locked("a"));
    /// ```
    #[inline]
    pub fn unlock(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        for entry_ref in self.entries.drain(..) {
            entry_ref.entry().release(self.owner);
            self.manager
                .table
                .release_reference(entry_ref, &self.manager.telemetry);
        }
    }

    /// Returns the manager that granted the locks.
    pub(crate) fn manager(&self) -> &'m LockManager {
        self.manager
    }

    fn new(manager: &'m LockManager, owner: Owner, mode: LockMode, capacity: usize) -> Self {
        LockBatch {
            manager,
            owner,
            mode,
            entries: Vec::with_capacity(capacity),
            released: false,
        }
    }
}

impl<'m> Drop for LockBatch<'m> {
    #[inline]
    fn drop(&mut self) {
        self.unlock();
    }
}
