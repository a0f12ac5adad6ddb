// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::lock_entry::LockEntry;
use super::telemetry::Telemetry;
use super::{utils, Owner};
use scc::hash_map::Entry;
use scc::HashMap;
use std::sync::Arc;
use tracing::trace;

/// [`LockTable`] maps row keys to their [`LockEntry`].
///
/// The table is split into shards, and a key is always found in the shard determined by its hash
/// value. A [`LockEntry`] is created on demand, and removed from the table as soon as it is no
/// longer referenced; creation and removal of an entry are serialized by the bucket lock of the
/// shard containing the key.
#[derive(Debug)]
pub(crate) struct LockTable {
    /// The list of shards.
    ///
    /// Each shard is an independent concurrent hash map, and therefore keys in different shards
    /// never contend on the same bucket lock.
    shards: Vec<Shard>,
}

/// [`EntryRef`] is a counted reference to a [`LockEntry`] in a [`LockTable`].
///
/// It must be returned to the table through [`LockTable::release_reference`].
#[derive(Debug)]
pub(crate) struct EntryRef {
    /// The row key.
    key: Arc<[u8]>,

    /// The index of the shard that contains the entry.
    shard: usize,

    /// The lock entry.
    entry: Arc<LockEntry>,
}

/// [`Shard`] is aligned to a typical size of cache lines.
#[repr(align(64))]
#[derive(Debug, Default)]
struct Shard(HashMap<Arc<[u8]>, Arc<LockEntry>>);

impl LockTable {
    /// Creates a new [`LockTable`] with the given number of shards.
    pub(crate) fn new(num_shards: usize) -> LockTable {
        debug_assert_ne!(num_shards, 0);
        LockTable {
            shards: (0..num_shards.max(1)).map(|_| Shard::default()).collect(),
        }
    }

    /// Returns a reference to the [`LockEntry`] of the key, creating one if none exists.
    pub(crate) fn resolve(&self, key: &[u8], telemetry: &Telemetry) -> EntryRef {
        let shard = utils::shard_of(key, self.shards.len());
        let map = &self.shards[shard].0;

        // A shared bucket lock suffices to add a reference, since removal requires the exclusive
        // bucket lock.
        if let Some((key, entry)) = map.read(key, |k, e| {
            e.add_ref();
            (k.clone(), e.clone())
        }) {
            return EntryRef { key, shard, entry };
        }

        let (key, entry) = match map.entry(Arc::from(key)) {
            Entry::Occupied(occupied) => {
                occupied.get().add_ref();
                (occupied.key().clone(), occupied.get().clone())
            }
            Entry::Vacant(vacant) => {
                let key = vacant.key().clone();
                let occupied = vacant.insert_entry(Arc::default());
                occupied.get().add_ref();
                telemetry.on_entry_created();
                trace!(?key, shard, "row lock entry created");
                (key, occupied.get().clone())
            }
        };
        EntryRef { key, shard, entry }
    }

    /// Returns the reference to the table.
    ///
    /// The entry is removed from the table if it was the last reference.
    pub(crate) fn release_reference(&self, entry_ref: EntryRef, telemetry: &Telemetry) {
        let EntryRef { key, shard, .. } = entry_ref;
        if self.shards[shard]
            .0
            .remove_if(&key[..], |e| e.remove_ref())
            .is_some()
        {
            telemetry.on_entry_reclaimed();
            trace!(?key, shard, "row lock entry reclaimed");
        }
    }

    /// Returns the current holder of the key without creating an entry.
    pub(crate) fn holder(&self, key: &[u8]) -> Option<Owner> {
        let shard = utils::shard_of(key, self.shards.len());
        self.shards[shard].0.read(key, |_, e| e.holder()).flatten()
    }

    /// Returns the number of owners waiting for the key.
    #[cfg(test)]
    pub(crate) fn num_waiters(&self, key: &[u8]) -> usize {
        let shard = utils::shard_of(key, self.shards.len());
        self.shards[shard].0.read(key, |_, e| e.num_waiters()).unwrap_or(0)
    }

    /// Returns the number of entries in the table.
    pub(crate) fn len(&self) -> usize {
        self.shards.iter().map(|s| s.0.len()).sum()
    }

    /// Invokes the supplied closure on every entry in the table.
    pub(crate) fn for_each_entry<F: FnMut(&LockEntry)>(&self, mut f: F) {
        for shard in &self.shards {
            shard.0.scan(|_, e| f(e.as_ref()));
        }
    }
}

impl EntryRef {
    /// Returns the row key.
    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }

    /// Returns the lock entry.
    pub(crate) fn entry(&self) -> &LockEntry {
        &self.entry
    }
}
