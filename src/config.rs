// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use super::{utils, Error};

/// Configuration of a [`LockManager`](crate::LockManager).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Config {
    /// The number of independently locked partitions of the lock table.
    ///
    /// Operations on keys in different shards never contend on the same table lock.
    pub num_shards: usize,
}

impl Config {
    /// A small configuration for tests that makes unrelated keys share shards.
    #[cfg(test)]
    pub(crate) fn for_testing() -> Self {
        Self { num_shards: 2 }
    }

    /// Checks whether the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongParameter`] if the number of shards is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use row_lock_manager::Config;
    ///
    /// assert!(Config::default().validate().is_ok());
    /// assert!(Config { num_shards: 0 }.validate().is_err());
    /// ```
    #[inline]
    pub fn validate(&self) -> Result<(), Error> {
        if self.num_shards == 0 {
            return Err(Error::WrongParameter("the number of shards must not be zero"));
        }
        Ok(())
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            num_shards: utils::advise_num_shards(),
        }
    }
}
