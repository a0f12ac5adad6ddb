// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

//! Collection of utility functions.

use std::convert::Into;
use std::fmt::{self, Debug};
use std::hash::Hasher;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;
use std::thread::available_parallelism;

/// The non-cryptographic [`Hasher`] used to spread row keys over shards.
///
/// Input bytes are folded into a single `u64` and mixed when finished, which is sufficient for
/// picking one out of a handful of shards.
#[derive(Clone, Copy, Debug)]
pub(crate) struct IntHasher(ArrayOrU64);

/// Returns a process-unique token for the current thread.
///
/// The token is assigned on first use and cached in thread-local storage. Tokens start from `1`,
/// and are never reused during the lifetime of the process.
///
/// # Examples
///
/// ```
/// use row_lock_manager::utils;
///
/// assert_eq!(utils::thread_token(), utils::thread_token());
/// assert_ne!(utils::thread_token(), 0);
/// ```
#[inline]
#[must_use]
pub fn thread_token() -> u64 {
    THREAD_TOKEN.with(|token| *token)
}

/// Returns the shard index of the key among `num_shards` shards.
///
/// # Examples
///
/// ```
/// use row_lock_manager::utils;
///
/// let shard = utils::shard_of(b"row-1", 8);
/// assert!(shard < 8);
/// assert_eq!(shard, utils::shard_of(b"row-1", 8));
/// ```
#[inline]
#[must_use]
pub fn shard_of(key: &[u8], num_shards: usize) -> usize {
    debug_assert_ne!(num_shards, 0);
    let mut hasher = IntHasher::default();
    hasher.write(key);
    hasher.write_usize(key.len());
    {
        #![allow(clippy::cast_possible_truncation)]
        (hasher.finish() as usize) % num_shards
    }
}

/// Returns the suggested number of shards.
///
/// Returns a power of two that is equal to or greater than
/// [`std::thread::available_parallelism`].
///
/// # Examples
///
/// ```
/// use row_lock_manager::utils;
///
/// assert!(utils::advise_num_shards().is_power_of_two());
/// ```
#[inline]
#[must_use]
pub fn advise_num_shards() -> usize {
    available_parallelism()
        .ok()
        .map_or(1, Into::<usize>::into)
        .next_power_of_two()
}

impl Default for IntHasher {
    #[inline]
    fn default() -> Self {
        Self(ArrayOrU64 { integer: 0 })
    }
}

impl Hasher for IntHasher {
    #[inline]
    fn write(&mut self, msg: &[u8]) {
        let mut iter = msg.chunks_exact(8);
        for c in iter.by_ref() {
            // Safety: the length of the array equals to that of `u64`.
            (0..8).for_each(|i| unsafe {
                self.0.array[i] ^= c[i];
            });
            // Safety: the length of the array equals to that of `u64`.
            unsafe {
                self.0.integer = self.0.integer.rotate_left(23);
            }
        }
        for i in 0..iter.remainder().len() {
            // Safety: the length of the array equals to that of `u64`.
            unsafe {
                self.0.array[i] ^= iter.remainder()[i];
            }
        }
        // Safety: the length of the array equals to that of `u64`.
        unsafe {
            self.0.integer = self.0.integer.rotate_left(29);
        }
    }

    /// The finalizer was excerpted from
    /// `http://mostlymangling.blogspot.com/2018/07/on-mixing-functions-in-fast-splittable.html`
    #[inline]
    fn finish(&self) -> u64 {
        // Safety: the length of the array equals to that of `u64`.
        let mut v = unsafe { self.0.integer };
        v ^= v.rotate_right(49) ^ v.rotate_left(24);
        v = v.wrapping_mul(0x9FB2_1C65_1E98_DF25);
        v ^= v.wrapping_shr(24);
        v = v.wrapping_mul(0x9FB2_1C65_1E98_DF25);
        v ^ v.wrapping_shr(24)
    }
}

/// [`ArrayOrU64`] is a `u64` integer that can also be used as an array of `u8`.
#[derive(Clone, Copy)]
union ArrayOrU64 {
    /// Array.
    array: [u8; 8],

    /// Integer.
    integer: u64,
}

impl Debug for ArrayOrU64 {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Safety: the length of the array equals to that of `u64`.
        unsafe { self.integer.fmt(f) }
    }
}

/// The next thread token to hand out.
static NEXT_THREAD_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TOKEN: u64 = NEXT_THREAD_TOKEN.fetch_add(1, Relaxed);
}
