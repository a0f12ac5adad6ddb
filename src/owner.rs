// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::utils;
use std::fmt;

/// [`Owner`] identifies the logical operation that requests row locks.
///
/// An [`Owner`] is an opaque token: the lock manager only ever compares two owners for equality.
/// Typically, a single owner corresponds to a single in-flight transaction, and nested scoped
/// acquisitions by the same owner are reentrant.
///
/// Owners created from an identifier and thread owners never compare equal: the most significant
/// bit is reserved for thread owners.
#[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Owner(u64);

/// The bit that is set only in thread owners.
const THREAD_OWNER_BIT: u64 = 1_u64 << 63;

impl Owner {
    /// Creates an [`Owner`] from an arbitrary identifier.
    ///
    /// The most significant bit of `id` is ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::Owner;
    ///
    /// assert_eq!(Owner::new(7), Owner::from(7));
    /// assert_ne!(Owner::new(7), Owner::new(8));
    /// assert_eq!(Owner::new(7 | (1 << 63)), Owner::new(7));
    /// ```
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Owner {
        Owner(id & !THREAD_OWNER_BIT)
    }

    /// Returns an [`Owner`] that is unique to the current thread.
    ///
    /// The returned owner is different from any owner created by [`Owner::new`].
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::Owner;
    ///
    /// let owner = Owner::current_thread();
    /// assert_eq!(owner, Owner::current_thread());
    /// assert_ne!(owner, std::thread::spawn(Owner::current_thread).join().unwrap());
    /// ```
    #[inline]
    #[must_use]
    pub fn current_thread() -> Owner {
        Owner(utils::thread_token() | THREAD_OWNER_BIT)
    }

    /// Returns the raw identifier.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl From<u64> for Owner {
    #[inline]
    fn from(id: u64) -> Self {
        Owner::new(id)
    }
}

impl fmt::Debug for Owner {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Owner({:#x})", self.0)
    }
}
