// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Row-level lock manager for a mutable storage engine.
//!
//! [`LockManager`] grants exclusive, reentrant locks on row keys to an [`Owner`], and
//! [`ScopedRowLock`] holds a batch of those locks until it is dropped.

mod config;
pub use config::Config;

mod error;
pub use error::Error;

mod lock_entry;
pub use lock_entry::TryLockOutcome;

mod lock_manager;
pub use lock_manager::{LockBatch, LockManager, LockMode};

mod lock_table;

mod owner;
pub use owner::Owner;

mod scoped_row_lock;
pub use scoped_row_lock::{RowLockState, ScopedRowLock};

mod telemetry;
pub use telemetry::TelemetrySnapshot;

pub mod utils;

#[cfg(test)]
mod tests;
