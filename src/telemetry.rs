// SPDX-FileCopyrightText: 2021 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

/// [`Telemetry`] aggregates statistics on the lock manager internals.
///
/// Counters are updated with relaxed atomic operations, and a [`TelemetrySnapshot`] is therefore
/// only approximately consistent while locks are being acquired and released.
#[derive(Debug, Default)]
pub(crate) struct Telemetry {
    acquired: AtomicU64,
    reentered: AtomicU64,
    busy: AtomicU64,
    waited: AtomicU64,
    entries_created: AtomicU64,
    entries_reclaimed: AtomicU64,
}

/// A point-in-time copy of the lock manager counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TelemetrySnapshot {
    /// The number of times a free key was granted to an owner, including hand-offs.
    pub acquired: u64,

    /// The number of reentrant acquisitions of a key already held by the same owner.
    pub reentered: u64,

    /// The number of non-blocking attempts that found the key held by another owner.
    pub busy: u64,

    /// The number of blocking attempts that had to wait for another owner.
    pub waited: u64,

    /// The number of lock entries created.
    pub entries_created: u64,

    /// The number of lock entries removed from the table.
    pub entries_reclaimed: u64,
}

impl Telemetry {
    pub(crate) fn on_acquired(&self) {
        self.acquired.fetch_add(1, Relaxed);
    }

    pub(crate) fn on_reentered(&self) {
        self.reentered.fetch_add(1, Relaxed);
    }

    pub(crate) fn on_busy(&self) {
        self.busy.fetch_add(1, Relaxed);
    }

    pub(crate) fn on_waited(&self) {
        self.waited.fetch_add(1, Relaxed);
    }

    pub(crate) fn on_entry_created(&self) {
        self.entries_created.fetch_add(1, Relaxed);
    }

    pub(crate) fn on_entry_reclaimed(&self) {
        self.entries_reclaimed.fetch_add(1, Relaxed);
    }

    pub(crate) fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            acquired: self.acquired.load(Relaxed),
            reentered: self.reentered.load(Relaxed),
            busy: self.busy.load(Relaxed),
            waited: self.waited.load(Relaxed),
            entries_created: self.entries_created.load(Relaxed),
            entries_reclaimed: self.entries_reclaimed.load(Relaxed),
        }
    }
}
