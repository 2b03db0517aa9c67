// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Terrane Sync: the thread coordination pieces the partitioning pipeline is built on.
//!
//! - [`bounded_buffer`] and [`bridge`]: a blocking, fixed-capacity hand-off from one producer
//!   thread to one consumer thread, with explicit completion.
//! - [`TaskGroup`]: a small set of cooperating threads that fail as a unit.
//! - [`WorkerPool`]: a fixed pool with a bounded queue where a full queue makes the submitter run
//!   the job itself.
//! - [`StopToken`], [`Stoppable`] and [`Ticker`]: cooperative cancellation and periodic
//!   reporting.
//!
//! Failures are never swallowed. A failing task or job stops its siblings and the first
//! originating error is handed back to whoever joins the group or shuts the pool down.
//!
//! ```
//! use terrane_sync::{SyncError, TaskGroup, bounded_buffer, bridge};
//!
//! let (tx, mut rx) = bounded_buffer::<u32>(4);
//! let mut total = 0;
//! let mut group = TaskGroup::<String>::new("sum");
//! group.spawn("bridge", move |stop| {
//!     bridge((1..=100).map(Ok::<u32, String>), tx, stop).map(|_| ())
//! });
//! group.spawn("sum", |_| {
//!     while let Some(v) = rx.recv()? {
//!         total += v;
//!     }
//!     Ok::<(), SyncError<String>>(())
//! });
//! group.join().unwrap();
//! assert_eq!(total, 5050);
//! ```

mod buffer;
mod error;
mod group;
mod pool;
mod stop;
mod ticker;

pub use buffer::{BufferConsumer, BufferProducer, bounded_buffer, bridge};
pub use error::{Disconnected, SyncError};
pub use group::TaskGroup;
pub use pool::{PoolStats, WorkerPool};
pub use stop::{StopToken, Stoppable};
pub use ticker::Ticker;
