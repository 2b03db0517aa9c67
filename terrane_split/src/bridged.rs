// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Running a consumer against a source decoded on another thread.

use terrane_io::{EntityContainer, EntitySource, entities};
use terrane_sync::{BufferConsumer, StopToken, SyncError, TaskGroup, bounded_buffer, bridge};

use crate::error::{Result, SplitError};

/// Decode `source` on a bridge thread and hand its entities to `consume` through a buffer of
/// `capacity` entities.
///
/// Both sides run in one fail-fast [`TaskGroup`] named `name`: if either fails the other is
/// stopped, and the originating error is returned.
pub(crate) fn run_bridged<S, T, F>(name: &str, source: S, capacity: usize, consume: F) -> Result<T>
where
    S: EntitySource + Send,
    T: Send,
    F: FnOnce(&mut BufferConsumer<EntityContainer>, &StopToken) -> Result<T> + Send,
{
    let (tx, mut rx) = bounded_buffer(capacity);
    let mut out = None;
    {
        let out = &mut out;
        let mut group = TaskGroup::<SplitError>::new(name);
        group.spawn("bridge", move |stop| {
            let items = entities(source).map(|r| r.map_err(SplitError::from));
            bridge(items, tx, stop).map(|_| ())
        });
        group.spawn("consume", move |stop| {
            let value = consume(&mut rx, stop).map_err(|e| match e {
                SplitError::Stopped => SyncError::Stopped,
                e => SyncError::Task(e),
            })?;
            *out = Some(value);
            Ok(())
        });
        group.join()?;
    }
    out.ok_or_else(|| SplitError::Worker(format!("{name}: consumer produced no result")))
}

/// Pull the next entity from a bridged buffer.
///
/// A lost producer means the bridge failed; that is reported as [`SplitError::Stopped`] so the
/// group returns the bridge's own error.
pub(crate) fn recv(rx: &mut BufferConsumer<EntityContainer>) -> Result<Option<EntityContainer>> {
    rx.recv().map_err(|_| SplitError::Stopped)
}
