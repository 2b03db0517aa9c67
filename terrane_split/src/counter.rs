// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Counting pass and count-driven tree refinement.

use std::collections::HashMap;
use std::time::Instant;

use kurbo::{Point, Rect};
use terrane_io::{EntityContainer, EntitySource};
use terrane_tree::{Path, SpatialTree};

use crate::bridged::{recv, run_bridged};
use crate::config::TreeConfig;
use crate::error::{Result, SplitError};

/// Nodes per leaf of one tree.
#[derive(Debug)]
pub struct LeafCounter<'t> {
    tree: &'t SpatialTree,
    counts: HashMap<Path, u64>,
    total: u64,
}

impl<'t> LeafCounter<'t> {
    /// An empty counter over `tree`.
    pub fn new(tree: &'t SpatialTree) -> Self {
        Self {
            tree,
            counts: HashMap::new(),
            total: 0,
        }
    }

    /// Count one entity. Only nodes have a position; other types are ignored.
    pub fn observe(&mut self, entity: &EntityContainer) {
        if let EntityContainer::Node(n) = entity {
            let leaf = self.tree.locate(Point::new(n.lon, n.lat));
            *self.counts.entry(leaf.path).or_default() += 1;
            self.total += 1;
        }
    }

    /// Count every entity of `source`.
    pub fn count<S: EntitySource>(&mut self, mut source: S) -> Result<u64> {
        let before = self.total;
        while let Some(e) = source.next_entity()? {
            self.observe(&e);
        }
        Ok(self.total - before)
    }

    /// Nodes counted in leaf `path`.
    pub fn get(&self, path: Path) -> u64 {
        self.counts.get(&path).copied().unwrap_or(0)
    }

    /// Nodes counted in total.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Per-leaf counts. Leaves without nodes are absent.
    pub fn into_counts(self) -> HashMap<Path, u64> {
        self.counts
    }
}

/// Count `source` with decoding on a separate thread.
pub fn count_threaded<S>(
    tree: &SpatialTree,
    source: S,
    capacity: usize,
) -> Result<HashMap<Path, u64>>
where
    S: EntitySource + Send,
{
    run_bridged("count", source, capacity, |rx, stop| {
        let mut counter = LeafCounter::new(tree);
        while let Some(e) = recv(rx)? {
            if stop.is_stopped() {
                return Err(SplitError::Stopped);
            }
            counter.observe(&e);
        }
        Ok(counter.into_counts())
    })
}

/// Shape a tree for `envelope` by counting and splitting crowded leaves.
///
/// Starts from a uniform split to `config.initial_depth`. Each round opens a fresh source with
/// `open`, counts nodes per leaf, and splits every leaf holding more than
/// `config.max_leaf_entities` nodes by `config.refine_levels` levels. Stops when no leaf is
/// crowded, after `config.max_refinements` rounds, or when crowded leaves are already as deep as
/// the split policy allows.
pub fn build_tree<S, F>(envelope: Rect, config: &TreeConfig, mut open: F) -> Result<SpatialTree>
where
    S: EntitySource,
    F: FnMut() -> Result<S>,
{
    config.validate()?;
    let _span = tracing::info_span!("build_tree", policy = config.split.name()).entered();
    let start = Instant::now();
    let mut tree = SpatialTree::with_depth(envelope, config.split, config.initial_depth)?;
    let max_depth = config.split.max_depth();

    for round in 0..config.max_refinements {
        let mut counter = LeafCounter::new(&tree);
        let nodes = counter.count(open()?)?;
        let counts = counter.into_counts();
        let split = tree.split_leaves(
            |leaf| {
                counts.get(&leaf.path).copied().unwrap_or(0) > config.max_leaf_entities
                    && u32::from(leaf.depth) + u32::from(config.refine_levels)
                        <= u32::from(max_depth)
            },
            config.refine_levels,
        )?;
        tracing::info!(round, nodes, split, leaves = tree.leaf_count(), "refined tree");
        if split == 0 {
            break;
        }
    }

    tracing::info!(
        leaves = tree.leaf_count(),
        elapsed_ms = start.elapsed().as_millis(),
        "tree built"
    );
    Ok(tree)
}
