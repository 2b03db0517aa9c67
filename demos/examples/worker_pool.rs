// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Worker pool and bounded buffer basics.
//!
//! Feed a bounded buffer from a bridge thread, fan the work out to a pool with a tiny queue so
//! the submitter runs some jobs itself, and report progress with a ticker.
//!
//! Run:
//! - `cargo run -p terrane_demos --example worker_pool`

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use terrane_sync::{SyncError, TaskGroup, Ticker, WorkerPool, bounded_buffer, bridge};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let sum = Arc::new(AtomicU64::new(0));
    let progress = Arc::clone(&sum);
    let ticker = Ticker::start("demo", Duration::from_millis(5), move |n| {
        tracing::info!(tick = n, sum = progress.load(Ordering::Relaxed), "progress");
    })
    .unwrap();

    let pool = WorkerPool::<String>::new("demo", 4, 2).unwrap();
    let (tx, mut rx) = bounded_buffer::<u64>(16);
    let mut group = TaskGroup::<String>::new("feed");
    group.spawn("bridge", move |stop| {
        bridge((1..=10_000_u64).map(Ok::<u64, String>), tx, stop).map(|_| ())
    });
    group.spawn("submit", |_| {
        while let Some(v) = rx.recv()? {
            let sum = Arc::clone(&sum);
            pool.submit(move || {
                sum.fetch_add(v * v, Ordering::Relaxed);
                Ok(())
            })?;
        }
        Ok::<(), SyncError<String>>(())
    });
    group.join().unwrap();

    let stats = pool.shutdown().unwrap();
    let ticks = ticker.finish();
    println!(
        "sum of squares {} ({} jobs, {} ran on the submitter, {ticks} ticks)",
        sum.load(Ordering::Relaxed),
        stats.completed,
        stats.caller_runs
    );
    assert_eq!(sum.load(Ordering::Relaxed), 10_000 * 10_001 * 20_001 / 6);
}
