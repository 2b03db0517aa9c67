// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact id lists: strictly increasing `i64` sequences stored as varint deltas.
//!
//! The first id is written as a zigzag varint of the id itself, so zero and negative ids are
//! representable. Every later id is written as the varint of `id - last`, which is always at least
//! one. There is no header and no trailer; the list ends where the byte source ends.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::entity::EntityId;
use crate::error::{IoError, Result};
use crate::varint;

/// Writes a compact id list.
#[derive(Debug)]
pub struct IdListWriter<W: Write> {
    inner: W,
    last: Option<EntityId>,
    count: u64,
}

impl<W: Write> IdListWriter<W> {
    /// Writer appending to `inner`.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            last: None,
            count: 0,
        }
    }

    /// Append `id`.
    ///
    /// Fails with [`IoError::OutOfOrder`] unless `id` is greater than the previous id. Nothing is
    /// written in that case, so the ids accepted so far remain a valid list.
    pub fn write(&mut self, id: EntityId) -> Result<()> {
        match self.last {
            None => {
                varint::write_u64(&mut self.inner, varint::zigzag(id))?;
            }
            Some(last) if id <= last => return Err(IoError::OutOfOrder { last, id }),
            Some(last) => {
                varint::write_u64(&mut self.inner, id.wrapping_sub(last) as u64)?;
            }
        }
        self.last = Some(id);
        self.count += 1;
        Ok(())
    }

    /// Last accepted id.
    pub fn last(&self) -> Option<EntityId> {
        self.last
    }

    /// Number of ids written.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Flush and return the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads a compact id list.
#[derive(Debug)]
pub struct IdListReader<R: Read> {
    inner: R,
    last: Option<EntityId>,
}

impl<R: Read> IdListReader<R> {
    /// Reader over `inner`.
    pub fn new(inner: R) -> Self {
        Self { inner, last: None }
    }

    /// Next id, or `Ok(None)` at the end of the list.
    pub fn next_id(&mut self) -> Result<Option<EntityId>> {
        let Some(raw) = varint::read_u64(&mut self.inner)? else {
            return Ok(None);
        };
        let id = match self.last {
            None => varint::unzigzag(raw),
            Some(last) => {
                let id = last.wrapping_add(raw as i64);
                if raw == 0 || id <= last {
                    return Err(IoError::CorruptStream(format!(
                        "id list delta {raw} after {last} does not increase"
                    )));
                }
                id
            }
        };
        self.last = Some(id);
        Ok(Some(id))
    }
}

impl<R: Read> Iterator for IdListReader<R> {
    type Item = Result<EntityId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_id().transpose()
    }
}

/// Sorted union of several id lists, see [`merge_id_lists`].
#[derive(Debug)]
pub struct MergedIds<R: Read> {
    readers: Vec<IdListReader<R>>,
    heap: BinaryHeap<Reverse<(EntityId, usize)>>,
    last: Option<EntityId>,
}

impl<R: Read> MergedIds<R> {
    /// Next id of the union, or `Ok(None)` once every input is drained.
    pub fn next_id(&mut self) -> Result<Option<EntityId>> {
        while let Some(Reverse((id, src))) = self.heap.pop() {
            if let Some(next) = self.readers[src].next_id()? {
                self.heap.push(Reverse((next, src)));
            }
            if self.last == Some(id) {
                continue;
            }
            self.last = Some(id);
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Drain the union into a writer, returning the number of ids written.
    pub fn write_to<W: Write>(mut self, out: &mut IdListWriter<W>) -> Result<u64> {
        let mut n = 0;
        while let Some(id) = self.next_id()? {
            out.write(id)?;
            n += 1;
        }
        Ok(n)
    }
}

impl<R: Read> Iterator for MergedIds<R> {
    type Item = Result<EntityId>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_id().transpose()
    }
}

/// Merge id lists into their sorted union, collapsing ids present in several inputs.
///
/// Reads the first id of every input before returning.
pub fn merge_id_lists<R: Read>(readers: Vec<IdListReader<R>>) -> Result<MergedIds<R>> {
    let mut readers = readers;
    let mut heap = BinaryHeap::with_capacity(readers.len());
    for (src, r) in readers.iter_mut().enumerate() {
        if let Some(id) = r.next_id()? {
            heap.push(Reverse((id, src)));
        }
    }
    Ok(MergedIds {
        readers,
        heap,
        last: None,
    })
}

/// Write `ids` to a new file at `path`, returning the number written.
pub fn write_id_list<I>(path: &Path, ids: I) -> Result<u64>
where
    I: IntoIterator<Item = EntityId>,
{
    let mut w = IdListWriter::new(BufWriter::new(File::create(path)?));
    for id in ids {
        w.write(id)?;
    }
    let n = w.count();
    w.finish()?;
    tracing::debug!(path = %path.display(), ids = n, "wrote id list");
    Ok(n)
}

/// Open the id list at `path`.
pub fn open_id_list(path: &Path) -> Result<IdListReader<BufReader<File>>> {
    Ok(IdListReader::new(BufReader::new(File::open(path)?)))
}

/// Read the whole id list at `path`.
pub fn read_id_list(path: &Path) -> Result<Vec<EntityId>> {
    open_id_list(path)?.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn encode(ids: &[EntityId]) -> Vec<u8> {
        let mut w = IdListWriter::new(Vec::new());
        for &id in ids {
            w.write(id).unwrap();
        }
        w.finish().unwrap()
    }

    fn decode(bytes: &[u8]) -> Vec<EntityId> {
        IdListReader::new(bytes).collect::<Result<_>>().unwrap()
    }

    #[test]
    fn small_deltas_take_one_byte() {
        let bytes = encode(&[1000, 1001, 1003, 1010]);
        // zigzag(1000) needs two bytes; each delta needs one.
        assert_eq!(bytes.len(), 5);
        assert_eq!(decode(&bytes), [1000, 1001, 1003, 1010]);
    }

    #[test]
    fn extreme_ids() {
        let ids = [i64::MIN, -1, 0, 1, i64::MAX];
        assert_eq!(decode(&encode(&ids)), ids);
    }

    #[test]
    fn out_of_order_keeps_prior_ids() {
        let mut w = IdListWriter::new(Vec::new());
        w.write(5).unwrap();
        w.write(7).unwrap();
        let err = w.write(7).unwrap_err();
        assert!(matches!(err, IoError::OutOfOrder { last: 7, id: 7 }));
        let err = w.write(3).unwrap_err();
        assert!(matches!(err, IoError::OutOfOrder { last: 7, id: 3 }));
        w.write(9).unwrap();
        let bytes = w.finish().unwrap();
        assert_eq!(decode(&bytes), [5, 7, 9]);
    }

    #[test]
    fn truncated_tail_is_corrupt_not_eof() {
        let mut bytes = encode(&[1, 2]);
        // Start a multi-byte delta and cut it off.
        bytes.push(0x80);
        let mut r = IdListReader::new(bytes.as_slice());
        assert_eq!(r.next_id().unwrap(), Some(1));
        assert_eq!(r.next_id().unwrap(), Some(2));
        assert!(matches!(r.next_id(), Err(IoError::CorruptStream(_))));
    }

    #[test]
    fn zero_delta_is_corrupt() {
        let bytes = [varint::zigzag(4) as u8, 0];
        let mut r = IdListReader::new(&bytes[..]);
        assert_eq!(r.next_id().unwrap(), Some(4));
        assert!(matches!(r.next_id(), Err(IoError::CorruptStream(_))));
    }

    #[test]
    fn merge_collapses_shared_ids() {
        let a = encode(&[1, 2, 3]);
        let b = encode(&[2, 3, 4]);
        let c = encode(&[5]);
        let readers = vec![
            IdListReader::new(a.as_slice()),
            IdListReader::new(b.as_slice()),
            IdListReader::new(c.as_slice()),
        ];
        let merged: Vec<_> = merge_id_lists(readers)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(merged, [1, 2, 3, 4, 5]);
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let merged = merge_id_lists::<&[u8]>(Vec::new()).unwrap();
        assert_eq!(merged.count(), 0);
    }

    #[test]
    fn file_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.idl");
        assert_eq!(write_id_list(&path, [3, 8, 21]).unwrap(), 3);
        assert_eq!(read_id_list(&path).unwrap(), [3, 8, 21]);
        assert!(matches!(
            write_id_list(&path, [3, 2]),
            Err(IoError::OutOfOrder { .. })
        ));
    }

    fn increasing() -> impl Strategy<Value = Vec<EntityId>> {
        proptest::collection::btree_set(any::<i64>(), 0..200)
            .prop_map(|s| s.into_iter().collect())
    }

    proptest! {
        #[test]
        fn round_trip(ids in increasing()) {
            prop_assert_eq!(decode(&encode(&ids)), ids);
        }

        #[test]
        fn merge_is_sorted_union(lists in proptest::collection::vec(increasing(), 0..6)) {
            let encoded: Vec<Vec<u8>> = lists.iter().map(|l| encode(l)).collect();
            let readers = encoded.iter().map(|b| IdListReader::new(b.as_slice())).collect();
            let merged: Vec<_> = merge_id_lists(readers).unwrap().collect::<Result<_>>().unwrap();
            let expected: Vec<_> = lists
                .iter()
                .flatten()
                .copied()
                .collect::<std::collections::BTreeSet<_>>()
                .into_iter()
                .collect();
            prop_assert_eq!(merged, expected);
        }
    }
}
