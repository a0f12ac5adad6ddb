// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::{Error, LockBatch, LockManager, LockMode, Owner};
use std::mem;

/// [`ScopedRowLock`] locks a batch of row keys for as long as it lives.
///
/// The keys are locked when the [`ScopedRowLock`] is created, and unlocked when it is dropped or
/// explicitly unlocked. Moving the value moves the responsibility of unlocking the keys along with
/// it; [`take`](Self::take) moves the locks out of a mutable reference, leaving a moved-from
/// handle behind that releases nothing.
#[derive(Debug)]
#[must_use = "the locks are released immediately if the handle is dropped"]
pub struct ScopedRowLock<'m> {
    /// The acquired locks.
    batch: Option<LockBatch<'m>>,

    /// The current state.
    state: RowLockState,

    /// The reason why the locks could not be acquired.
    error: Option<Error>,
}

/// [`ScopedRowLock`] states.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RowLockState {
    /// All the keys are locked.
    Acquired,

    /// The keys could not be locked, and none are held.
    Failed,

    /// The locks were moved to another [`ScopedRowLock`].
    MovedFrom,

    /// The locks were released.
    Released,
}

impl<'m> ScopedRowLock<'m> {
    /// Locks the supplied keys on behalf of the owner, waiting for other owners if needed.
    ///
    /// Keys must be sorted in the same global order by all callers, see [`LockManager::lock`].
    /// If the [`LockManager`] is shutting down, the returned handle holds no locks and
    /// [`acquired`](Self::acquired) returns `false`.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{LockManager, LockMode, Owner, ScopedRowLock};
    ///
    /// let lock_manager = LockManager::new();
    /// {
    ///     let row_lock = ScopedRowLock::new(&lock_manager, Owner::new(1), &["a", "b"], LockMode::Exclusive);
    ///     assert!(row_lock.acquired());
    ///     assert!(lock_manager.is_locked("a"));
    /// }
    /// assert!(!lock_manager.is_locked("a"));
    /// ```
    #[inline]
    pub fn new<K: AsRef<[u8]>>(
        manager: &'m LockManager,
        owner: Owner,
        keys: &[K],
        mode: LockMode,
    ) -> ScopedRowLock<'m> {
        match manager.lock(keys, owner, mode) {
            Ok(batch) => ScopedRowLock {
                batch: Some(batch),
                state: RowLockState::Acquired,
                error: None,
            },
            Err(error) => ScopedRowLock {
                batch: None,
                state: RowLockState::Failed,
                error: Some(error),
            },
        }
    }

    /// Returns `true` if the handle holds the locks.
    #[inline]
    pub fn acquired(&self) -> bool {
        self.state == RowLockState::Acquired
    }

    /// Returns the current state.
    #[inline]
    pub fn state(&self) -> RowLockState {
        self.state
    }

    /// Returns the reason why the keys could not be locked.
    #[inline]
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns the owner of the locks if the handle holds them.
    #[inline]
    pub fn owner(&self) -> Option<Owner> {
        self.batch.as_ref().map(LockBatch::owner)
    }

    /// Returns an iterator over the locked keys.
    #[inline]
    pub fn keys(&self) -> impl Iterator<Item = &[u8]> {
        self.batch.iter().flat_map(|batch| batch.keys())
    }

    /// Releases the locks before the handle is dropped.
    ///
    /// It has no effect if the handle does not hold the locks.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{LockManager, LockMode, Owner, ScopedRowLock, RowLockState};
    ///
    /// let lock_manager = LockManager::new();
    /// let mut row_lock = ScopedRowLock::new(&lock_manager, Owner::new(1), &["a"], LockMode::Exclusive);
    /// row_lock.unlock();
    /// assert_eq!(row_lock.state(), RowLockState::Released);
    /// assert!(!lock_manager.is_locked("a"));
    /// ```
    #[inline]
    pub fn unlock(&mut self) {
        if let Some(batch) = self.batch.take() {
            debug_assert_eq!(self.state, RowLockState::Acquired);
            batch.manager().unlock(batch);
            self.state = RowLockState::Released;
        }
    }

    /// Moves the locks into a new [`ScopedRowLock`].
    ///
    /// The returned handle takes over the state of `self`, and `self` is left in the
    /// [`RowLockState::MovedFrom`] state, releasing nothing when dropped.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::{LockManager, LockMode, Owner, ScopedRowLock};
    ///
    /// let lock_manager = LockManager::new();
    /// let mut row_lock = ScopedRowLock::new(&lock_manager, Owner::new(1), &["a"], LockMode::Exclusive);
    /// let moved_lock = row_lock.take();
    /// assert!(moved_lock.acquired());
    /// assert!(!row_lock.acquired());
    ///
    /// drop(row_lock);
    /// assert!(lock_manager.is_locked("a"));
    /// drop(moved_lock);
    /// assert!(!lock_manager.is_locked("a"));
    /// ```
    #[inline]
    pub fn take(&mut self) -> ScopedRowLock<'m> {
        ScopedRowLock {
            batch: self.batch.take(),
            state: mem::replace(&mut self.state, RowLockState::MovedFrom),
            error: self.error.take(),
        }
    }
}

impl<'m> Drop for ScopedRowLock<'m> {
    #[inline]
    fn drop(&mut self) {
        self.unlock();
    }
}
