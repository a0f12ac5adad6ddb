// SPDX-FileCopyrightText: 2023 Changgyoo Park <wvwwvwwv@me.com>
//
// SPDX-License-Identifier: Apache-2.0

use criterion::{criterion_group, criterion_main, Criterion};
use row_lock_manager::utils;
use std::thread;

fn std_thread_id(c: &mut Criterion) {
    let current_thread_id = thread::current().id();
    c.bench_function("std: thread::id", |b| {
        b.iter(|| {
            assert_eq!(current_thread_id, thread::current().id());
        });
    });
}

fn thread_token(c: &mut Criterion) {
    let current_thread_token = utils::thread_token();
    c.bench_function("utils: thread_token", |b| {
        b.iter(|| {
            assert_eq!(current_thread_token, utils::thread_token());
        });
    });
}

fn shard_of(c: &mut Criterion) {
    let key = b"slice000-with-a-longer-suffix";
    let shard = utils::shard_of(key, 16);
    c.bench_function("utils: shard_of", |b| {
        b.iter(|| {
            assert_eq!(shard, utils::shard_of(key, 16));
        });
    });
}

criterion_group!(utils, std_thread_id, thread_token, shard_of);
criterion_main!(utils);
