// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Leaf entity files.
//!
//! Layout:
//!
//! ```text
//! "TRNE"  version:u8  flags:u8  [min_lon max_lon min_lat max_lat: f64 BE]   (bounds if flags & 1)
//! { len:u32 BE  bincode(EntityContainer)[len] }*
//! 0:u32  count:u64 BE                                                        (trailer)
//! ```
//!
//! A reader that reaches end of input before the trailer reports [`IoError::CorruptStream`], so a
//! file cut short by a crash is never mistaken for a complete leaf.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::entity::{Bounds, EntityContainer};
use crate::error::{IoError, Result};
use crate::stream::{EntitySink, EntitySource};

/// File magic.
pub(crate) const MAGIC: [u8; 4] = *b"TRNE";
/// Current format version.
pub(crate) const VERSION: u8 = 1;
/// Largest frame a reader accepts.
pub(crate) const MAX_FRAME_LEN: u32 = 1 << 30;

const FLAG_BOUNDS: u8 = 0b0000_0001;

/// Writes an entity file.
#[derive(Debug)]
pub struct EntityFileWriter<W: Write> {
    inner: W,
    header_written: bool,
    completed: bool,
    count: u64,
}

impl<W: Write> EntityFileWriter<W> {
    /// Writer over `inner`. Nothing is written until the first call.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            header_written: false,
            completed: false,
            count: 0,
        }
    }

    /// Entities written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Return the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn header(&mut self, bounds: Option<Bounds>) -> Result<()> {
        let mut head = Vec::with_capacity(6 + 32);
        head.extend_from_slice(&MAGIC);
        head.push(VERSION);
        match bounds {
            Some(b) => {
                head.push(FLAG_BOUNDS);
                for v in [b.min_lon, b.max_lon, b.min_lat, b.max_lat] {
                    head.extend_from_slice(&v.to_be_bytes());
                }
            }
            None => head.push(0),
        }
        self.inner.write_all(&head)?;
        self.header_written = true;
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.completed {
            return Err(IoError::Precondition("entity file already completed".into()));
        }
        Ok(())
    }
}

impl<W: Write> EntitySink for EntityFileWriter<W> {
    fn write_bounds(&mut self, bounds: Bounds) -> Result<()> {
        self.check_open()?;
        if self.header_written {
            return Err(IoError::Precondition(
                "bounds must be written before any entity".into(),
            ));
        }
        self.header(Some(bounds))
    }

    fn write(&mut self, entity: &EntityContainer) -> Result<()> {
        self.check_open()?;
        if !self.header_written {
            self.header(None)?;
        }
        let body = bincode::serialize(entity)?;
        let len = u32::try_from(body.len())
            .ok()
            .filter(|&l| l > 0 && l <= MAX_FRAME_LEN)
            .ok_or_else(|| IoError::Encode(format!("entity frame of {} bytes", body.len())))?;
        self.inner.write_all(&len.to_be_bytes())?;
        self.inner.write_all(&body)?;
        self.count += 1;
        Ok(())
    }

    fn complete(&mut self) -> Result<()> {
        self.check_open()?;
        if !self.header_written {
            self.header(None)?;
        }
        self.inner.write_all(&0_u32.to_be_bytes())?;
        self.inner.write_all(&self.count.to_be_bytes())?;
        self.inner.flush()?;
        self.completed = true;
        Ok(())
    }
}

/// Reads an entity file.
#[derive(Debug)]
pub struct EntityFileReader<R: Read> {
    inner: R,
    bounds: Option<Bounds>,
    count: u64,
    finished: bool,
}

impl<R: Read> EntityFileReader<R> {
    /// Read the header of `inner`.
    pub fn new(mut inner: R) -> Result<Self> {
        let mut head = [0_u8; 6];
        read_full(&mut inner, &mut head, "header")?;
        if head[0..4] != MAGIC {
            return Err(IoError::Format("not an entity file".into()));
        }
        if head[4] != VERSION {
            return Err(IoError::Format(format!(
                "unsupported entity file version {}",
                head[4]
            )));
        }
        let bounds = if head[5] & FLAG_BOUNDS != 0 {
            let mut raw = [0_u8; 32];
            read_full(&mut inner, &mut raw, "bounds")?;
            let f = |i: usize| {
                let mut a = [0_u8; 8];
                a.copy_from_slice(&raw[i * 8..i * 8 + 8]);
                f64::from_be_bytes(a)
            };
            Some(Bounds::new(f(0), f(1), f(2), f(3)))
        } else {
            None
        };
        Ok(Self {
            inner,
            bounds,
            count: 0,
            finished: false,
        })
    }

    /// Entities read so far.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl<R: Read> EntitySource for EntityFileReader<R> {
    fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    fn next_entity(&mut self) -> Result<Option<EntityContainer>> {
        if self.finished {
            return Ok(None);
        }
        let mut len = [0_u8; 4];
        read_full(&mut self.inner, &mut len, "frame length")?;
        let len = u32::from_be_bytes(len);
        if len == 0 {
            let mut count = [0_u8; 8];
            read_full(&mut self.inner, &mut count, "trailer")?;
            let expected = u64::from_be_bytes(count);
            if expected != self.count {
                return Err(IoError::CorruptStream(format!(
                    "trailer records {expected} entities, read {}",
                    self.count
                )));
            }
            self.finished = true;
            return Ok(None);
        }
        if len > MAX_FRAME_LEN {
            return Err(IoError::CorruptStream(format!("frame length {len}")));
        }
        let mut body = vec![0_u8; len as usize];
        read_full(&mut self.inner, &mut body, "frame")?;
        let entity = bincode::deserialize(&body)?;
        self.count += 1;
        Ok(Some(entity))
    }
}

fn read_full<R: Read>(r: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            IoError::CorruptStream(format!("entity file truncated in {what}"))
        }
        _ => IoError::Io(e),
    })
}

/// Create or truncate an entity file at `path`.
pub fn create_entity_file(path: &Path) -> Result<EntityFileWriter<BufWriter<File>>> {
    Ok(EntityFileWriter::new(BufWriter::new(File::create(path)?)))
}

/// Open the entity file at `path`.
pub fn open_entity_file(path: &Path) -> Result<EntityFileReader<BufReader<File>>> {
    EntityFileReader::new(BufReader::new(File::open(path)?))
}

/// Read a whole entity file into memory.
pub fn read_entity_file(path: &Path) -> Result<(Option<Bounds>, Vec<EntityContainer>)> {
    let mut r = open_entity_file(path)?;
    let mut out = Vec::new();
    while let Some(e) = r.next_entity()? {
        out.push(e);
    }
    Ok((r.bounds(), out))
}
