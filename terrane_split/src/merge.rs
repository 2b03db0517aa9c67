// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! K-way merges of entity streams.
//!
//! Both merges are themselves [`EntitySource`]s, so they compose with any sink through
//! [`terrane_io::copy_stream`]. The bounds of a merge are the union of its sources' bounds.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use terrane_io::{
    Bounds, EntityContainer, EntityId, EntitySource, EntityType, IoError, PeekableSource,
};

use crate::error::Result;

/// Counters of one merge.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Entities emitted.
    pub emitted: u64,
    /// Entities dropped because their id was just emitted.
    pub duplicates: u64,
}

fn union_bounds<S: EntitySource>(sources: &[PeekableSource<S>]) -> Option<Bounds> {
    sources
        .iter()
        .filter_map(PeekableSource::bounds)
        .reduce(|a, b| a.union(&b))
}

fn out_of_order(src: usize, prev: &EntityContainer, next: &EntityContainer) -> IoError {
    IoError::CorruptStream(format!(
        "merge source {src} is not in default order: {:?} {} followed by {:?} {}",
        prev.entity_type(),
        prev.id(),
        next.entity_type(),
        next.id()
    ))
}

/// Numeric k-way merge of sources that are each in default order.
///
/// One priority queue per entity type holds the pending `(id, source)` head of every source
/// currently positioned on that type. Types are drained in default order and never interleaved.
/// An id equal to the last one emitted for its type is dropped, which collapses copies of an
/// entity present in several sources (and repeated ids within one source). Ties between sources
/// resolve to the lowest source index, so the copy kept is deterministic.
///
/// A source whose next entity sorts before its previous one is reported as
/// [`IoError::CorruptStream`].
#[derive(Debug)]
pub struct SortedMerge<S> {
    sources: Vec<PeekableSource<S>>,
    queues: [BinaryHeap<Reverse<(EntityId, usize)>>; 3],
    last: [Option<EntityId>; 3],
    current: usize,
    bounds: Option<Bounds>,
    stats: MergeStats,
}

impl<S: EntitySource> SortedMerge<S> {
    /// Merge `sources`, reading the first entity of each.
    pub fn new(sources: Vec<S>) -> Result<Self> {
        let sources = sources
            .into_iter()
            .map(PeekableSource::new)
            .collect::<terrane_io::Result<Vec<_>>>()?;
        let mut queues = [BinaryHeap::new(), BinaryHeap::new(), BinaryHeap::new()];
        for (i, s) in sources.iter().enumerate() {
            if let Some(head) = s.peek() {
                queues[head.entity_type().ordinal()].push(Reverse((head.id(), i)));
            }
        }
        Ok(Self {
            bounds: union_bounds(&sources),
            sources,
            queues,
            last: [None; 3],
            current: 0,
            stats: MergeStats::default(),
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    fn pull(&mut self) -> terrane_io::Result<Option<EntityContainer>> {
        while self.current < EntityType::ALL.len() {
            let Some(Reverse((id, src))) = self.queues[self.current].pop() else {
                self.current += 1;
                continue;
            };
            let source = &mut self.sources[src];
            let Some(entity) = source.take()? else {
                return Err(IoError::CorruptStream(format!(
                    "merge source {src} lost its pending entity"
                )));
            };
            if let Some(next) = source.peek() {
                if next.order_key() < entity.order_key() {
                    return Err(out_of_order(src, &entity, next));
                }
                self.queues[next.entity_type().ordinal()].push(Reverse((next.id(), src)));
            }
            if self.last[self.current] == Some(id) {
                self.stats.duplicates += 1;
                continue;
            }
            self.last[self.current] = Some(id);
            self.stats.emitted += 1;
            return Ok(Some(entity));
        }
        Ok(None)
    }
}

impl<S: EntitySource> EntitySource for SortedMerge<S> {
    fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    fn next_entity(&mut self) -> terrane_io::Result<Option<EntityContainer>> {
        self.pull()
    }
}

/// Per-type concatenation of sources that are each in default order.
///
/// All nodes of source 0, then all nodes of source 1, and so on; then the ways of every source
/// in the same order, then the relations. Ids are never compared across sources and nothing is
/// deduplicated, so the output is only in default order if the sources cover disjoint,
/// increasing id ranges. A source whose type goes backwards is reported as
/// [`IoError::CorruptStream`].
#[derive(Debug)]
pub struct UnsortedMerge<S> {
    sources: Vec<PeekableSource<S>>,
    current_type: usize,
    current_src: usize,
    bounds: Option<Bounds>,
    stats: MergeStats,
}

impl<S: EntitySource> UnsortedMerge<S> {
    /// Merge `sources`, reading the first entity of each.
    pub fn new(sources: Vec<S>) -> Result<Self> {
        let sources = sources
            .into_iter()
            .map(PeekableSource::new)
            .collect::<terrane_io::Result<Vec<_>>>()?;
        Ok(Self {
            bounds: union_bounds(&sources),
            sources,
            current_type: 0,
            current_src: 0,
            stats: MergeStats::default(),
        })
    }

    /// Counters so far.
    pub fn stats(&self) -> MergeStats {
        self.stats
    }

    fn pull(&mut self) -> terrane_io::Result<Option<EntityContainer>> {
        while self.current_type < EntityType::ALL.len() {
            let Some(source) = self.sources.get_mut(self.current_src) else {
                self.current_type += 1;
                self.current_src = 0;
                continue;
            };
            let head_type = source.peek().map(|e| e.entity_type().ordinal());
            match head_type {
                Some(t) if t == self.current_type => {
                    let entity = source.take()?;
                    if let (Some(e), Some(next)) = (&entity, source.peek())
                        && next.entity_type().ordinal() < t
                    {
                        return Err(out_of_order(self.current_src, e, next));
                    }
                    self.stats.emitted += 1;
                    return Ok(entity);
                }
                Some(t) if t < self.current_type => {
                    return Err(IoError::CorruptStream(format!(
                        "merge source {} yields {:?} after later types",
                        self.current_src,
                        EntityType::ALL[t]
                    )));
                }
                _ => self.current_src += 1,
            }
        }
        Ok(None)
    }
}

impl<S: EntitySource> EntitySource for UnsortedMerge<S> {
    fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    fn next_entity(&mut self) -> terrane_io::Result<Option<EntityContainer>> {
        self.pull()
    }
}
