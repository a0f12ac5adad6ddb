// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

mod contention;
mod examples;

use tracing_subscriber::EnvFilter;

/// Installs a log subscriber that writes to the test output, filtered by `RUST_LOG`.
pub(crate) fn setup_tracing() {
    drop(
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init(),
    );
}
