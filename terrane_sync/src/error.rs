// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for groups, pools and buffers.

use std::any::Any;

use thiserror::Error;

/// The other end of a bounded buffer went away without finishing the stream.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("buffer peer disconnected")]
pub struct Disconnected;

/// Outcome of a failed task group or worker pool run.
#[derive(Error, Debug)]
pub enum SyncError<E> {
    /// A task returned an error. This is the first failure the run saw.
    #[error("task failed: {0}")]
    Task(E),

    /// A task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),

    /// A worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// A task gave up because the run was stopped.
    #[error("stopped")]
    Stopped,

    /// A bounded buffer lost its peer.
    #[error("buffer peer disconnected")]
    Disconnected,
}

impl<E> SyncError<E> {
    /// Whether this error was caused by a sibling failing rather than originating here.
    ///
    /// Groups and pools report an originating error in preference to these.
    pub fn is_secondary(&self) -> bool {
        matches!(self, Self::Stopped | Self::Disconnected)
    }
}

impl<E> From<Disconnected> for SyncError<E> {
    fn from(_: Disconnected) -> Self {
        Self::Disconnected
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

/// First-error slot shared by the members of one run.
///
/// The first originating error wins; secondary errors are kept only until one arrives.
#[derive(Debug)]
pub(crate) struct FirstError<E> {
    slot: parking_lot::Mutex<Option<SyncError<E>>>,
}

impl<E> FirstError<E> {
    pub(crate) fn new() -> Self {
        Self {
            slot: parking_lot::Mutex::new(None),
        }
    }

    /// Record `err`. Returns `true` if it became the reported error.
    pub(crate) fn record(&self, err: SyncError<E>) -> bool {
        let mut slot = self.slot.lock();
        let replace = match &*slot {
            None => true,
            Some(prev) => prev.is_secondary() && !err.is_secondary(),
        };
        if replace {
            *slot = Some(err);
        }
        replace
    }

    pub(crate) fn is_set(&self) -> bool {
        self.slot.lock().is_some()
    }

    pub(crate) fn take(&self) -> Option<SyncError<E>> {
        self.slot.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn originating_error_beats_secondary() {
        let first = FirstError::<&str>::new();
        assert!(first.record(SyncError::Disconnected));
        assert!(first.record(SyncError::Task("boom")));
        assert!(!first.record(SyncError::Task("later")));
        assert!(!first.record(SyncError::Stopped));
        assert!(matches!(first.take(), Some(SyncError::Task("boom"))));
    }

    #[test]
    fn panic_payloads() {
        let p: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(&*p), "static");
        let p: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*p), "owned");
        let p: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(&*p), "non-string panic payload");
    }
}
