// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A buffered file output that holds no OS handle between flushes.
//!
//! A distribution run may have thousands of leaf outputs open at once. [`ClosingFile`] buffers
//! writes in memory and, whenever the buffer passes its threshold or on [`Write::flush`], opens
//! the target in append mode, writes the buffer, and closes the handle again.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Default buffer size before an implicit flush.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 64 * 1024;

/// Append-only buffered output to one file.
#[derive(Debug)]
pub struct ClosingFile {
    path: PathBuf,
    buf: Vec<u8>,
    threshold: usize,
    written: u64,
}

impl ClosingFile {
    /// Create or truncate `path` and return an output appending to it.
    pub fn create(path: impl Into<PathBuf>, threshold: usize) -> io::Result<Self> {
        let path = path.into();
        File::create(&path)?;
        Ok(Self::append(path, threshold))
    }

    /// Output appending to `path`, which is created on first flush if missing.
    pub fn append(path: impl Into<PathBuf>, threshold: usize) -> Self {
        Self {
            path: path.into(),
            buf: Vec::new(),
            threshold: threshold.max(1),
            written: 0,
        }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes accepted so far, flushed or not.
    pub fn bytes_written(&self) -> u64 {
        self.written + self.buf.len() as u64
    }

    /// Bytes waiting for the next flush.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&self.buf)?;
        self.written += self.buf.len() as u64;
        self.buf.clear();
        Ok(())
    }
}

impl Write for ClosingFile {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= self.threshold {
            self.flush_buf()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buf()
    }
}

impl Drop for ClosingFile {
    fn drop(&mut self) {
        if let Err(e) = self.flush_buf() {
            tracing::warn!(path = %self.path.display(), error = %e, "dropping unflushed output");
        }
    }
}
