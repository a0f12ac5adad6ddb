// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

/// [`Error`] defines all the error codes used by the row lock manager.
///
/// A key being held by another owner is not an error; it is reported as
/// [`TryLockOutcome::Busy`](crate::TryLockOutcome::Busy). Misuse of the locking protocol, e.g.,
/// releasing a key that the caller does not hold, is a programming error and panics instead.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum Error {
    /// The [`LockManager`](crate::LockManager) is shutting down, and no more locks can be
    /// acquired.
    #[error("the lock manager is shutting down")]
    ShuttingDown,

    /// The supplied parameter value is wrong.
    #[error("wrong parameter: {0}")]
    WrongParameter(&'static str),
}
