// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory sort of one leaf partition.

use std::fs;
use std::path::Path;

use terrane_io::{EntityContainer, EntitySink, EntitySource, create_entity_file, open_entity_file};

use crate::error::Result;

/// Counters of one sort.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Entities read.
    pub read: u64,
    /// Entities written.
    pub written: u64,
    /// Repeated ids dropped.
    pub duplicates: u64,
}

/// Sorts a whole leaf into default order.
///
/// The leaf is read into memory, one bucket per entity type, and each bucket is sorted by id.
/// The sort is stable, so with duplicate removal the first occurrence of an id is the one kept.
/// Leaves are sized by the counting pass to fit in memory; the leaf boundary is what makes this
/// the in-memory half of an external sort.
#[derive(Copy, Clone, Debug, Default)]
pub struct LeafSorter {
    ignore_duplicates: bool,
}

impl LeafSorter {
    /// A sorter. With `ignore_duplicates`, runs of equal ids within a type collapse to one.
    pub fn new(ignore_duplicates: bool) -> Self {
        Self { ignore_duplicates }
    }

    /// Sort `source` into `sink` and complete it. A bounds record is passed through.
    pub fn sort<S: EntitySource, K: EntitySink>(
        &self,
        mut source: S,
        sink: &mut K,
    ) -> Result<SortStats> {
        let mut stats = SortStats::default();
        let mut buckets: [Vec<EntityContainer>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        while let Some(e) = source.next_entity()? {
            stats.read += 1;
            buckets[e.entity_type().ordinal()].push(e);
        }
        if let Some(b) = source.bounds() {
            sink.write_bounds(b)?;
        }
        for bucket in &mut buckets {
            bucket.sort_by_key(EntityContainer::id);
            if self.ignore_duplicates {
                let before = bucket.len();
                bucket.dedup_by_key(|e| e.id());
                stats.duplicates += (before - bucket.len()) as u64;
            }
            for e in bucket.iter() {
                sink.write(e)?;
                stats.written += 1;
            }
        }
        sink.complete()?;
        Ok(stats)
    }
}

/// Sort the entity file at `path` in place.
///
/// The sorted leaf is written to a sibling file and renamed over `path` only once complete, so
/// a failed sort leaves the input untouched.
pub fn sort_leaf_file(path: &Path, sorter: &LeafSorter) -> Result<SortStats> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".sorting");
    let tmp = std::path::PathBuf::from(tmp_name);

    let stats = {
        let reader = open_entity_file(path)?;
        let mut writer = create_entity_file(&tmp)?;
        match sorter.sort(reader, &mut writer) {
            Ok(stats) => stats,
            Err(e) => {
                drop(writer);
                let _ = fs::remove_file(&tmp);
                return Err(e);
            }
        }
    };
    fs::rename(&tmp, path)?;
    tracing::debug!(
        path = %path.display(),
        entities = stats.written,
        duplicates = stats.duplicates,
        "sorted leaf"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrane_io::build::{node, relation, way};
    use terrane_io::{Bounds, EntityFileWriter, VecSink, VecSource, is_default_order};

    fn shuffled() -> Vec<EntityContainer> {
        vec![
            relation(3, &[]),
            node(9, 0.0, 0.0),
            way(4, &[9]),
            node(2, 1.0, 1.0),
            node(9, 5.0, 5.0),
            way(1, &[2]),
            relation(3, &[]),
            node(5, 0.0, 0.0),
        ]
    }

    #[test]
    fn restores_default_order() {
        let mut sink = VecSink::new();
        let stats = LeafSorter::new(false)
            .sort(VecSource::new(shuffled()), &mut sink)
            .unwrap();
        assert_eq!(stats.read, 8);
        assert_eq!(stats.duplicates, 0);
        assert_eq!(sink.ids(), [2, 5, 9, 9, 1, 4, 3, 3]);
        assert!(sink.completed);
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let mut sink = VecSink::new();
        let stats = LeafSorter::new(true)
            .sort(VecSource::new(shuffled()), &mut sink)
            .unwrap();
        assert_eq!(stats.duplicates, 2);
        assert_eq!(sink.ids(), [2, 5, 9, 1, 4, 3]);
        assert!(is_default_order(&sink.entities));
        let EntityContainer::Node(n9) = &sink.entities[2] else {
            panic!("expected a node");
        };
        assert_eq!((n9.lon, n9.lat), (0.0, 0.0));
    }

    #[test]
    fn sorting_sorted_output_is_a_no_op() {
        let sorter = LeafSorter::new(true);
        let mut once = VecSink::new();
        sorter.sort(VecSource::new(shuffled()), &mut once).unwrap();
        let mut twice = VecSink::new();
        sorter
            .sort(VecSource::new(once.entities.clone()), &mut twice)
            .unwrap();
        assert_eq!(once.entities, twice.entities);
    }

    #[test]
    fn sorts_a_file_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.trn");
        let bounds = Bounds::new(0.0, 1.0, 0.0, 1.0);
        {
            let mut w = create_entity_file(&path).unwrap();
            w.write_bounds(bounds).unwrap();
            for e in shuffled() {
                w.write(&e).unwrap();
            }
            w.complete().unwrap();
        }
        let stats = sort_leaf_file(&path, &LeafSorter::new(true)).unwrap();
        assert_eq!(stats.written, 6);
        let (b, ents) = terrane_io::read_entity_file(&path).unwrap();
        assert_eq!(b, Some(bounds));
        assert!(is_default_order(&ents));
        assert!(!dir.path().join("leaf.trn.sorting").exists());
    }

    #[test]
    fn truncated_input_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("leaf.trn");
        let mut w = EntityFileWriter::new(Vec::new());
        w.write(&node(1, 0.0, 0.0)).unwrap();
        let bytes = w.into_inner();
        fs::write(&path, &bytes).unwrap();
        assert!(sort_leaf_file(&path, &LeafSorter::new(false)).is_err());
        assert_eq!(fs::read(&path).unwrap(), bytes);
        assert!(!dir.path().join("leaf.trn.sorting").exists());
    }
}
