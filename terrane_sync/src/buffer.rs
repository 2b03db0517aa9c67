// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded single-producer single-consumer buffer with explicit completion.
//!
//! [`BufferProducer::put`] blocks while the buffer is full and [`BufferConsumer::recv`] blocks
//! while it is empty, so a fast side is throttled to the speed of the slow side. The producer
//! ends the stream with [`BufferProducer::finish`]; dropping it without finishing makes the
//! consumer fail with [`Disconnected`] instead of seeing a clean end, so a crashed producer can
//! never pass for a short stream.

use crossbeam_channel::{Receiver, Sender, bounded};

use crate::error::{Disconnected, SyncError};
use crate::stop::StopToken;

enum Msg<T> {
    Item(T),
    Done,
}

/// Sending half of a [`bounded_buffer`].
pub struct BufferProducer<T> {
    tx: Sender<Msg<T>>,
}

/// Receiving half of a [`bounded_buffer`].
pub struct BufferConsumer<T> {
    rx: Receiver<Msg<T>>,
    done: bool,
}

impl<T> std::fmt::Debug for BufferProducer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferProducer")
            .field("queued", &self.tx.len())
            .finish_non_exhaustive()
    }
}

impl<T> std::fmt::Debug for BufferConsumer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferConsumer")
            .field("queued", &self.rx.len())
            .field("done", &self.done)
            .finish()
    }
}

/// A buffer holding at most `capacity` items (at least one).
///
/// The completion marker takes a slot like any item, so [`BufferProducer::finish`] blocks on a
/// full buffer too.
pub fn bounded_buffer<T>(capacity: usize) -> (BufferProducer<T>, BufferConsumer<T>) {
    let (tx, rx) = bounded(capacity.max(1));
    (BufferProducer { tx }, BufferConsumer { rx, done: false })
}

impl<T> BufferProducer<T> {
    /// Append `item`, blocking while the buffer is full.
    pub fn put(&self, item: T) -> Result<(), Disconnected> {
        self.tx.send(Msg::Item(item)).map_err(|_| Disconnected)
    }

    /// End the stream. The consumer drains what is queued, then sees `Ok(None)`.
    pub fn finish(self) -> Result<(), Disconnected> {
        self.tx.send(Msg::Done).map_err(|_| Disconnected)
    }
}

impl<T> BufferConsumer<T> {
    /// Next item, blocking while the buffer is empty.
    ///
    /// Returns `Ok(None)` once the producer has finished and everything queued was taken.
    pub fn recv(&mut self) -> Result<Option<T>, Disconnected> {
        if self.done {
            return Ok(None);
        }
        match self.rx.recv() {
            Ok(Msg::Item(item)) => Ok(Some(item)),
            Ok(Msg::Done) => {
                self.done = true;
                Ok(None)
            }
            Err(_) => Err(Disconnected),
        }
    }
}

impl<T> Iterator for BufferConsumer<T> {
    type Item = Result<T, Disconnected>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv().transpose()
    }
}

/// Drain `source` into `producer`, then finish the stream.
///
/// This is the body of a bridge task: run it on its own thread so that decoding the source and
/// consuming the buffer overlap. It checks `stop` between items and returns
/// [`SyncError::Stopped`] once the token is set. An error from the source is returned as
/// [`SyncError::Task`] and the producer is dropped unfinished, so the consumer fails too.
///
/// Returns the number of items forwarded.
pub fn bridge<I, T, E>(
    source: I,
    producer: BufferProducer<T>,
    stop: &StopToken,
) -> Result<u64, SyncError<E>>
where
    I: IntoIterator<Item = Result<T, E>>,
{
    let mut n = 0;
    for item in source {
        if stop.is_stopped() {
            return Err(SyncError::Stopped);
        }
        producer.put(item.map_err(SyncError::Task)?)?;
        n += 1;
    }
    producer.finish()?;
    tracing::trace!(items = n, "bridge drained source");
    Ok(n)
}
