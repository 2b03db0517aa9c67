// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for partitioning and merge runs.

use terrane_io::IoError;
use terrane_sync::{Disconnected, SyncError};
use terrane_tree::TreeError;
use thiserror::Error;

/// Errors raised by counting, distribution, sorting and merging.
#[derive(Error, Debug)]
pub enum SplitError {
    /// Reading or writing entities failed.
    #[error(transparent)]
    Io(#[from] IoError),

    /// The partition tree could not be shaped.
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// A pooled or grouped task failed without an error of its own (panic, lost peer).
    #[error("worker failed: {0}")]
    Worker(String),

    /// A check made before any work began failed.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The run was stopped before it completed.
    #[error("stopped")]
    Stopped,
}

impl From<SyncError<Self>> for SplitError {
    fn from(err: SyncError<Self>) -> Self {
        match err {
            SyncError::Task(e) => e,
            SyncError::Panicked(msg) => Self::Worker(format!("panic: {msg}")),
            SyncError::Spawn(e) => Self::Worker(format!("cannot start thread: {e}")),
            SyncError::Stopped => Self::Stopped,
            SyncError::Disconnected => Self::Worker(Disconnected.to_string()),
        }
    }
}

impl From<std::io::Error> for SplitError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Io(err))
    }
}

/// Result type for partitioning operations.
pub type Result<T> = std::result::Result<T, SplitError>;

/// Make sure an output root is empty or creatable before a run writes into it.
pub(crate) fn ensure_output_dir(dir: &std::path::Path) -> Result<()> {
    terrane_io::ensure_empty_dir(dir).map_err(|e| match e {
        IoError::Precondition(msg) => SplitError::Precondition(msg),
        e => SplitError::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_errors_unwrap() {
        let err = SplitError::from(SyncError::Task(SplitError::Config("workers".into())));
        assert!(matches!(err, SplitError::Config(_)));
        let err = SplitError::from(SyncError::<SplitError>::Panicked("leaf".into()));
        assert_eq!(err.to_string(), "worker failed: panic: leaf");
        let err = SplitError::from(SyncError::<SplitError>::Disconnected);
        assert!(matches!(err, SplitError::Worker(_)));
    }

    #[test]
    fn non_empty_output_dir_is_a_precondition_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        ensure_output_dir(&out).unwrap();
        assert!(out.is_dir());
        std::fs::write(out.join("1d"), b"stale").unwrap();
        assert!(matches!(ensure_output_dir(&out), Err(SplitError::Precondition(_))));
    }
}
