// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

//! [`LockEntry`] implementation.

use super::{Error, Owner};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release, SeqCst};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize};
use std::sync::Arc;
use tracing::trace;

/// [`LockEntry`] is the lock state of a single row key.
///
/// The state is protected by a mutex that is private to the entry, therefore operations on
/// different keys never contend with each other once their entries have been resolved.
#[derive(Debug, Default)]
pub struct LockEntry {
    /// Owner, hold count, and waiters.
    state: Mutex<State>,

    /// The number of live references to the entry.
    ///
    /// It is only modified while the shard bucket that contains the entry is locked.
    ref_cnt: AtomicUsize,
}

/// The result of a non-blocking lock attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TryLockOutcome {
    /// The key was free and now belongs to the requester.
    Acquired,

    /// The key was already held by the requester, and the hold count was incremented.
    AlreadyLockedBySelf,

    /// The key is held by a different owner.
    Busy,
}

/// How a blocking acquisition was granted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Grant {
    /// The key was free.
    Free,

    /// The requester already held the key.
    Reentrant,

    /// The requester waited, and the previous holder handed the key over.
    HandedOff,
}

#[derive(Debug, Default)]
struct State {
    /// The current holder.
    owner: Option<Owner>,

    /// The number of nested acquisitions by `owner`.
    hold_count: u32,

    /// Blocked requests in arrival order.
    waiters: VecDeque<Arc<Waiter>>,
}

/// [`Waiter`] is a blocked acquisition request.
///
/// The verdict is only modified while the entry state is locked, and the waiting thread only
/// inspects it while holding the same lock.
#[derive(Debug)]
struct Waiter {
    owner: Owner,
    verdict: AtomicU8,
    cond: Condvar,
}

const WAITING: u8 = 0;
const GRANTED: u8 = 1;
const ABORTED: u8 = 2;

impl TryLockOutcome {
    /// Returns `true` if the requester holds the key after the attempt.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::TryLockOutcome;
    ///
    /// assert!(TryLockOutcome::Acquired.is_acquired());
    /// assert!(TryLockOutcome::AlreadyLockedBySelf.is_acquired());
    /// assert!(!TryLockOutcome::Busy.is_acquired());
    /// ```
    #[inline]
    #[must_use]
    pub fn is_acquired(self) -> bool {
        !matches!(self, TryLockOutcome::Busy)
    }
}

impl LockEntry {
    /// Tries to acquire the lock without blocking.
    pub(crate) fn try_acquire(&self, owner: Owner) -> TryLockOutcome {
        self.state.lock().try_acquire(owner)
    }

    /// Acquires the lock, waiting for the current holder to hand it over if needed.
    ///
    /// The waiter is abandoned if `closed` is set before it is enqueued, or if
    /// [`abort_waiters`](Self::abort_waiters) is invoked while it is waiting.
    pub(crate) fn acquire_blocking(&self, owner: Owner, closed: &AtomicBool) -> Result<Grant, Error> {
        let mut state = self.state.lock();
        match state.try_acquire(owner) {
            TryLockOutcome::Acquired => return Ok(Grant::Free),
            TryLockOutcome::AlreadyLockedBySelf => return Ok(Grant::Reentrant),
            TryLockOutcome::Busy => (),
        }
        if closed.load(SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let waiter = Arc::new(Waiter {
            owner,
            verdict: AtomicU8::new(WAITING),
            cond: Condvar::new(),
        });
        state.waiters.push_back(waiter.clone());
        trace!(?owner, holder = ?state.owner, queued = state.waiters.len(), "waiting for row lock");

        loop {
            match waiter.verdict.load(Acquire) {
                GRANTED => {
                    debug_assert_eq!(state.owner, Some(owner));
                    return Ok(Grant::HandedOff);
                }
                ABORTED => return Err(Error::ShuttingDown),
                _ => waiter.cond.wait(&mut state),
            }
        }
    }

    /// Releases one acquisition made by `owner`.
    ///
    /// When the hold count drops to zero, the lock is handed over to the oldest waiter.
    ///
    /// # Panics
    ///
    /// Panics if `owner` does not hold the lock.
    pub(crate) fn release(&self, owner: Owner) {
        let mut state = self.state.lock();
        assert_eq!(
            state.owner,
            Some(owner),
            "row lock released by an owner that does not hold it"
        );
        debug_assert_ne!(state.hold_count, 0);
        state.hold_count -= 1;
        if state.hold_count != 0 {
            return;
        }
        state.owner = None;

        let State {
            owner: holder,
            hold_count,
            waiters,
        } = &mut *state;
        if let Some(head) = waiters.pop_front() {
            let next = head.owner;
            *holder = Some(next);
            *hold_count = 1;
            head.settle(GRANTED);

            // Other requests from the same owner would have been admitted as reentrant.
            waiters.retain(|w| {
                if w.owner == next {
                    *hold_count += 1;
                    w.settle(GRANTED);
                    false
                } else {
                    true
                }
            });
            trace!(from = ?owner, to = ?next, hold_count = *hold_count, "row lock handed off");
        }
    }

    /// Wakes up every waiter without granting the lock.
    pub(crate) fn abort_waiters(&self) -> usize {
        let mut state = self.state.lock();
        let num_waiters = state.waiters.len();
        for waiter in state.waiters.drain(..) {
            waiter.settle(ABORTED);
        }
        num_waiters
    }

    /// Returns the current holder.
    pub(crate) fn holder(&self) -> Option<Owner> {
        self.state.lock().owner
    }

    /// Returns the number of nested acquisitions by the current holder.
    #[cfg(test)]
    pub(crate) fn hold_count(&self) -> u32 {
        self.state.lock().hold_count
    }

    /// Returns the number of blocked requests.
    #[cfg(test)]
    pub(crate) fn num_waiters(&self) -> usize {
        self.state.lock().waiters.len()
    }

    /// Adds a reference.
    ///
    /// The caller must hold the bucket lock of the table shard containing the entry.
    pub(crate) fn add_ref(&self) {
        self.ref_cnt.fetch_add(1, Relaxed);
    }

    /// Removes a reference, and returns `true` if the entry can be removed from the table.
    ///
    /// The caller must hold the bucket lock of the table shard containing the entry.
    pub(crate) fn remove_ref(&self) -> bool {
        let prev = self.ref_cnt.fetch_sub(1, Relaxed);
        debug_assert_ne!(prev, 0);
        if prev != 1 {
            return false;
        }
        let held = self.holder().is_some();
        debug_assert!(!held, "unreferenced row lock entry is still held");
        !held
    }

    /// Returns the number of references.
    #[cfg(test)]
    pub(crate) fn ref_cnt(&self) -> usize {
        self.ref_cnt.load(Relaxed)
    }
}

impl State {
    fn try_acquire(&mut self, owner: Owner) -> TryLockOutcome {
        match self.owner {
            None => {
                debug_assert_eq!(self.hold_count, 0);
                self.owner = Some(owner);
                self.hold_count = 1;
                TryLockOutcome::Acquired
            }
            Some(holder) if holder == owner => {
                assert!(
                    self.hold_count < u32::MAX,
                    "row lock reentrancy depth exceeded"
                );
                self.hold_count += 1;
                TryLockOutcome::AlreadyLockedBySelf
            }
            Some(_) => TryLockOutcome::Busy,
        }
    }
}

impl Waiter {
    /// Sets the verdict and wakes the waiting thread.
    fn settle(&self, verdict: u8) {
        self.verdict.store(verdict, Release);
        self.cond.notify_one();
    }
}
