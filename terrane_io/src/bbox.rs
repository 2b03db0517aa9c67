// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Id/bounding-box tables for extent-bearing entities.
//!
//! Each record is 44 bytes, big-endian: `id: i64, min_x: f64, max_x: f64, min_y: f64, max_y: f64,
//! size: i32`. Files have no header; a trailing partial record is corruption.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use kurbo::Rect;

use crate::entity::{EntityId, EntityType};
use crate::error::{IoError, Result};

/// Size of one encoded record.
pub const RECORD_LEN: usize = 44;

/// Spatial extent of one way or relation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IdBboxEntry {
    /// Entity id.
    pub id: EntityId,
    /// Bounding box (x = longitude, y = latitude).
    pub envelope: Rect,
    /// Approximate encoded size of the entity in bytes.
    pub size: i32,
}

impl IdBboxEntry {
    /// Encode into a fixed-width record.
    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut out = [0_u8; RECORD_LEN];
        out[0..8].copy_from_slice(&self.id.to_be_bytes());
        out[8..16].copy_from_slice(&self.envelope.x0.to_be_bytes());
        out[16..24].copy_from_slice(&self.envelope.x1.to_be_bytes());
        out[24..32].copy_from_slice(&self.envelope.y0.to_be_bytes());
        out[32..40].copy_from_slice(&self.envelope.y1.to_be_bytes());
        out[40..44].copy_from_slice(&self.size.to_be_bytes());
        out
    }

    /// Decode a fixed-width record.
    pub fn from_bytes(b: &[u8; RECORD_LEN]) -> Self {
        let f = |at: usize| {
            let mut a = [0_u8; 8];
            a.copy_from_slice(&b[at..at + 8]);
            f64::from_be_bytes(a)
        };
        let mut id = [0_u8; 8];
        id.copy_from_slice(&b[0..8]);
        let mut size = [0_u8; 4];
        size.copy_from_slice(&b[40..44]);
        Self {
            id: i64::from_be_bytes(id),
            envelope: Rect::new(f(8), f(24), f(16), f(32)),
            size: i32::from_be_bytes(size),
        }
    }
}

/// Appends records to a byte sink.
#[derive(Debug)]
pub struct BboxWriter<W: Write> {
    inner: W,
    count: u64,
}

impl<W: Write> BboxWriter<W> {
    /// Writer over `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Append one record.
    pub fn write(&mut self, entry: &IdBboxEntry) -> Result<()> {
        self.inner.write_all(&entry.to_bytes())?;
        self.count += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads records from a byte source.
#[derive(Debug)]
pub struct BboxReader<R: Read> {
    inner: R,
}

impl<R: Read> BboxReader<R> {
    /// Reader over `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next record, or `Ok(None)` at a record boundary at end of input.
    pub fn next_entry(&mut self) -> Result<Option<IdBboxEntry>> {
        let mut buf = [0_u8; RECORD_LEN];
        let mut filled = 0;
        while filled < RECORD_LEN {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            RECORD_LEN => Ok(Some(IdBboxEntry::from_bytes(&buf))),
            n => Err(IoError::CorruptStream(format!(
                "bbox record truncated after {n} of {RECORD_LEN} bytes"
            ))),
        }
    }
}

impl<R: Read> Iterator for BboxReader<R> {
    type Item = Result<IdBboxEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

/// In-memory lookup of extents by entity type and id.
#[derive(Clone, Debug, Default)]
pub struct BboxIndex {
    entries: HashMap<(EntityType, EntityId), IdBboxEntry>,
}

impl BboxIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the extent of `(kind, entry.id)`.
    pub fn insert(&mut self, kind: EntityType, entry: IdBboxEntry) {
        self.entries.insert((kind, entry.id), entry);
    }

    /// Extent of `(kind, id)`, if known.
    pub fn get(&self, kind: EntityType, id: EntityId) -> Option<&IdBboxEntry> {
        self.entries.get(&(kind, id))
    }

    /// Number of extents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds nothing.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add every record of the file at `path` as extents of `kind`. Returns the record count.
    pub fn load(&mut self, kind: EntityType, path: &Path) -> Result<usize> {
        let mut n = 0;
        for entry in BboxReader::new(BufReader::new(File::open(path)?)) {
            self.insert(kind, entry?);
            n += 1;
        }
        tracing::debug!(path = %path.display(), ?kind, records = n, "loaded bbox table");
        Ok(n)
    }
}

/// Read the bbox table at `path` as extents of `kind`.
pub fn read_bbox_index(kind: EntityType, path: &Path) -> Result<BboxIndex> {
    let mut index = BboxIndex::new();
    index.load(kind, path)?;
    Ok(index)
}

/// Write `entries` to a new file at `path`.
pub fn write_bbox_file<'a, I>(path: &Path, entries: I) -> Result<u64>
where
    I: IntoIterator<Item = &'a IdBboxEntry>,
{
    let mut w = BboxWriter::new(BufWriter::new(File::create(path)?));
    for e in entries {
        w.write(e)?;
    }
    let n = w.count();
    w.finish()?;
    Ok(n)
}
