// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for stream and file I/O.

use thiserror::Error;

/// Errors raised by readers, writers and file helpers.
///
/// End of stream is not an error: readers report it as `Ok(None)`.
#[derive(Error, Debug)]
pub enum IoError {
    /// An id list was written out of order. This is a caller bug and is never retried.
    #[error("id {id} is not greater than the previously written id {last}")]
    OutOfOrder {
        /// Last id accepted by the writer.
        last: i64,
        /// Rejected id.
        id: i64,
    },

    /// Binary data ended in the middle of a record or failed a structural check.
    #[error("corrupt stream: {0}")]
    CorruptStream(String),

    /// Underlying I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An entity could not be serialized or deserialized.
    #[error("entity encoding error: {0}")]
    Encode(String),

    /// A file header or tree file is not in a recognized format.
    #[error("format error: {0}")]
    Format(String),

    /// A precondition on the file system failed before any work began.
    #[error("precondition failed: {0}")]
    Precondition(String),
}

impl From<bincode::Error> for IoError {
    fn from(err: bincode::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

impl From<terrane_tree::TreeError> for IoError {
    fn from(err: terrane_tree::TreeError) -> Self {
        Self::Format(err.to_string())
    }
}

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, IoError>;
