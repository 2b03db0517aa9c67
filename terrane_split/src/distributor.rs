// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Routing an entity stream into per-leaf outputs.

use std::collections::BTreeMap;
use std::time::Instant;

use kurbo::Point;
use terrane_io::{
    BboxIndex, Bounds, ClosingFile, EntityContainer, EntityFileWriter, EntitySink, EntitySource,
    LeafDirs,
};
use terrane_tree::{Leaf, Path, SpatialTree};

use crate::bridged::{recv, run_bridged};
use crate::config::DistributeConfig;
use crate::error::{Result, SplitError, ensure_output_dir};

/// How ways and relations are placed.
#[derive(Clone, Debug, Default)]
pub enum ExtentMode {
    /// Only nodes are distributed; ways and relations are counted as skipped.
    #[default]
    Skip,
    /// Ways and relations go to every leaf their bounding box intersects.
    Bboxes(BboxIndex),
}

/// Opens the output of a leaf the first time an entity is routed to it.
pub trait SinkFactory {
    /// Output type.
    type Sink: EntitySink;

    /// Open the output of `leaf`.
    fn open(&mut self, leaf: &Leaf) -> Result<Self::Sink>;
}

/// Leaf outputs as entity files under a [`LeafDirs`] layout, written through [`ClosingFile`].
#[derive(Clone, Debug)]
pub struct FileSinkFactory {
    dirs: LeafDirs,
    file_name: String,
    flush_threshold: usize,
}

impl FileSinkFactory {
    /// Write `file_name` into each leaf directory under `dirs`, buffering
    /// [`DistributeConfig::flush_threshold_bytes`] per leaf.
    ///
    /// The root of `dirs` must be empty or missing; it is created if needed. Anything already
    /// there fails with [`SplitError::Precondition`], so stale leaves never mix into a run.
    pub fn create(
        dirs: LeafDirs,
        file_name: impl Into<String>,
        config: &DistributeConfig,
    ) -> Result<Self> {
        config.validate()?;
        ensure_output_dir(dirs.root())?;
        Ok(Self {
            dirs,
            file_name: file_name.into(),
            flush_threshold: config.flush_threshold_bytes,
        })
    }

    /// Output layout.
    pub fn dirs(&self) -> &LeafDirs {
        &self.dirs
    }
}

impl SinkFactory for FileSinkFactory {
    type Sink = EntityFileWriter<ClosingFile>;

    fn open(&mut self, leaf: &Leaf) -> Result<Self::Sink> {
        let path = self.dirs.create_leaf_file(leaf.path, &self.file_name)?;
        Ok(EntityFileWriter::new(ClosingFile::create(
            path,
            self.flush_threshold,
        )?))
    }
}

/// Counters of one distribution run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributionStats {
    /// Entities read, per type in default order.
    pub read: [u64; 3],
    /// Entity writes, per type. Replicated entities count once per leaf.
    pub written: [u64; 3],
    /// Extra copies written for entities spanning several leaves.
    pub replicated: u64,
    /// Nodes outside the root envelope, placed on its boundary.
    pub clamped: u64,
    /// Ways and relations skipped, either by [`ExtentMode::Skip`] or for lack of a bbox.
    pub unlocated: u64,
    /// Entities dropped because their type is not in [`DistributeConfig::kinds`].
    pub filtered: u64,
    /// Leaf outputs opened.
    pub leaves_opened: u64,
    /// Sum of bbox size hints routed to each leaf.
    pub size_hints: BTreeMap<Path, u64>,
}

/// Routes entities to the leaves of a tree.
///
/// Nodes go to the single leaf located for their coordinate. Ways and relations go to every
/// leaf whose envelope intersects their bounding box when an [`ExtentMode::Bboxes`] index is
/// given. Outputs are opened lazily; [`LeafDistributor::finish`] completes every one of them.
pub struct LeafDistributor<'t, F: SinkFactory> {
    tree: &'t SpatialTree,
    factory: F,
    config: DistributeConfig,
    extents: ExtentMode,
    sinks: BTreeMap<Path, F::Sink>,
    stats: DistributionStats,
}

impl<F: SinkFactory> std::fmt::Debug for LeafDistributor<'_, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafDistributor")
            .field("open_leaves", &self.sinks.len())
            .field("extents", &self.extents)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'t, F: SinkFactory> LeafDistributor<'t, F> {
    /// A distributor writing leaves of `tree` through `factory`.
    pub fn new(tree: &'t SpatialTree, factory: F, config: DistributeConfig) -> Self {
        Self {
            tree,
            factory,
            config,
            extents: ExtentMode::Skip,
            sinks: BTreeMap::new(),
            stats: DistributionStats::default(),
        }
    }

    /// Place ways and relations according to `extents`.
    pub fn with_extents(mut self, extents: ExtentMode) -> Self {
        self.extents = extents;
        self
    }

    /// Counters so far.
    pub fn stats(&self) -> &DistributionStats {
        &self.stats
    }

    /// Route one entity.
    pub fn push(&mut self, entity: &EntityContainer) -> Result<()> {
        let ty = entity.entity_type();
        self.stats.read[ty.ordinal()] += 1;
        if !self.config.kinds.includes(ty) {
            self.stats.filtered += 1;
            return Ok(());
        }
        match entity {
            EntityContainer::Node(n) => {
                let pt = Point::new(n.lon, n.lat);
                if !terrane_tree::envelope::contains(&self.tree.root_envelope(), pt) {
                    self.stats.clamped += 1;
                }
                let leaf = self.tree.locate(pt);
                self.write_to(&leaf, entity)
            }
            EntityContainer::Way(_) | EntityContainer::Relation(_) => {
                let ExtentMode::Bboxes(index) = &self.extents else {
                    self.stats.unlocated += 1;
                    return Ok(());
                };
                let Some(entry) = index.get(ty, entity.id()).copied() else {
                    self.stats.unlocated += 1;
                    return Ok(());
                };
                let leaves = self.tree.query_rect(entry.envelope);
                if leaves.is_empty() {
                    self.stats.unlocated += 1;
                    return Ok(());
                }
                self.stats.replicated += leaves.len() as u64 - 1;
                let hint = u64::try_from(entry.size).unwrap_or(0);
                for leaf in &leaves {
                    *self.stats.size_hints.entry(leaf.path).or_default() += hint;
                    self.write_to(leaf, entity)?;
                }
                Ok(())
            }
        }
    }

    fn write_to(&mut self, leaf: &Leaf, entity: &EntityContainer) -> Result<()> {
        let sink = match self.sinks.entry(leaf.path) {
            std::collections::btree_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::btree_map::Entry::Vacant(e) => {
                let mut sink = self.factory.open(leaf)?;
                if self.config.write_bounds {
                    sink.write_bounds(Bounds::from(leaf.envelope))?;
                }
                self.stats.leaves_opened += 1;
                e.insert(sink)
            }
        };
        sink.write(entity)?;
        self.stats.written[entity.entity_type().ordinal()] += 1;
        Ok(())
    }

    /// Route every entity of `source`, then complete all outputs.
    pub fn distribute<S: EntitySource>(mut self, mut source: S) -> Result<DistributionStats> {
        self.config.validate()?;
        let _span = tracing::info_span!("distribute").entered();
        let start = Instant::now();
        while let Some(e) = source.next_entity()? {
            self.push(&e)?;
        }
        let stats = self.finish()?;
        log_stats(&stats, start);
        Ok(stats)
    }

    /// Complete every opened output, in path order, and return the counters.
    ///
    /// The first completion error aborts; outputs after it are dropped uncompleted.
    pub fn finish(self) -> Result<DistributionStats> {
        for (path, mut sink) in self.sinks {
            sink.complete().map_err(|e| {
                tracing::error!(leaf = format_args!("{path:x}"), error = %e, "leaf output failed");
                e
            })?;
        }
        Ok(self.stats)
    }
}

/// Like [`LeafDistributor::distribute`], decoding `source` on its own thread.
///
/// The tree must be fully shaped before this starts; it is only read.
pub fn distribute_threaded<F, S>(
    tree: &SpatialTree,
    factory: F,
    config: DistributeConfig,
    extents: ExtentMode,
    source: S,
) -> Result<DistributionStats>
where
    F: SinkFactory + Send,
    F::Sink: Send,
    S: EntitySource + Send,
{
    config.validate()?;
    let _span = tracing::info_span!("distribute", threaded = true).entered();
    let start = Instant::now();
    let capacity = config.buffer_capacity;
    let distributor = LeafDistributor::new(tree, factory, config).with_extents(extents);
    let stats = run_bridged("distribute", source, capacity, move |rx, stop| {
        let mut distributor = distributor;
        while let Some(e) = recv(rx)? {
            if stop.is_stopped() {
                return Err(SplitError::Stopped);
            }
            distributor.push(&e)?;
        }
        distributor.finish()
    })?;
    log_stats(&stats, start);
    Ok(stats)
}

fn log_stats(stats: &DistributionStats, start: Instant) {
    let [nodes, ways, relations] = stats.read;
    tracing::info!(
        nodes,
        ways,
        relations,
        writes = stats.written.iter().sum::<u64>(),
        replicated = stats.replicated,
        clamped = stats.clamped,
        unlocated = stats.unlocated,
        filtered = stats.filtered,
        leaves = stats.leaves_opened,
        elapsed_ms = start.elapsed().as_millis(),
        "distribution complete"
    );
}
