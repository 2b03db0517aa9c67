// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Configuration for tree building, distribution and merge runs.

use serde::{Deserialize, Serialize};
use terrane_io::{DEFAULT_FLUSH_THRESHOLD, EntityKinds};
use terrane_tree::SplitPolicy;

use crate::error::{Result, SplitError};

/// How the tree is shaped before distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Depth of the uniform split done before any counting.
    /// Default: 4
    pub initial_depth: u8,

    /// Leaves holding more nodes than this are split further.
    /// Default: 1,000,000
    pub max_leaf_entities: u64,

    /// Maximum number of count-and-split rounds.
    /// Default: 4
    pub max_refinements: u32,

    /// Levels added to a crowded leaf per round.
    /// Default: 2
    pub refine_levels: u8,

    /// How nodes are divided.
    #[serde(with = "policy_name")]
    pub split: SplitPolicy,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            initial_depth: 4,
            max_leaf_entities: 1_000_000,
            max_refinements: 4,
            refine_levels: 2,
            split: SplitPolicy::Alternate,
        }
    }
}

impl TreeConfig {
    /// Set the initial uniform depth.
    pub fn with_initial_depth(mut self, depth: u8) -> Self {
        self.initial_depth = depth;
        self
    }

    /// Set the per-leaf node limit.
    pub fn with_max_leaf_entities(mut self, n: u64) -> Self {
        self.max_leaf_entities = n;
        self
    }

    /// Set the number of refinement rounds.
    pub fn with_max_refinements(mut self, n: u32) -> Self {
        self.max_refinements = n;
        self
    }

    /// Set the split policy.
    pub fn with_split(mut self, split: SplitPolicy) -> Self {
        self.split = split;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.initial_depth > self.split.max_depth() {
            return Err(SplitError::Config(format!(
                "initial_depth {} exceeds {} for {} splits",
                self.initial_depth,
                self.split.max_depth(),
                self.split.name()
            )));
        }
        if self.max_leaf_entities == 0 {
            return Err(SplitError::Config("max_leaf_entities must be positive".into()));
        }
        if self.refine_levels == 0 {
            return Err(SplitError::Config("refine_levels must be positive".into()));
        }
        Ok(())
    }
}

/// How entities are routed to leaf outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributeConfig {
    /// Entities buffered between the decoding and routing threads.
    /// Default: 4096
    pub buffer_capacity: usize,

    /// Write each leaf's envelope as the bounds record of its output.
    /// Default: true
    pub write_bounds: bool,

    /// Bytes a leaf output buffers before appending to its file.
    /// Default: 64 KiB
    pub flush_threshold_bytes: usize,

    /// Entity types routed to leaves. Others are read and dropped.
    /// Default: all
    #[serde(with = "kinds_bits")]
    pub kinds: EntityKinds,
}

impl Default for DistributeConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 4096,
            write_bounds: true,
            flush_threshold_bytes: DEFAULT_FLUSH_THRESHOLD,
            kinds: EntityKinds::all(),
        }
    }
}

impl DistributeConfig {
    /// Set the bridge buffer capacity.
    pub fn with_buffer_capacity(mut self, n: usize) -> Self {
        self.buffer_capacity = n;
        self
    }

    /// Enable or disable leaf bounds records.
    pub fn with_write_bounds(mut self, on: bool) -> Self {
        self.write_bounds = on;
        self
    }

    /// Set the per-leaf flush threshold.
    pub fn with_flush_threshold_bytes(mut self, n: usize) -> Self {
        self.flush_threshold_bytes = n;
        self
    }

    /// Route only entities of the given types.
    pub fn with_kinds(mut self, kinds: EntityKinds) -> Self {
        self.kinds = kinds;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(SplitError::Config("buffer_capacity must be positive".into()));
        }
        if self.flush_threshold_bytes == 0 {
            return Err(SplitError::Config(
                "flush_threshold_bytes must be positive".into(),
            ));
        }
        if self.kinds.is_empty() {
            return Err(SplitError::Config("kinds selects no entity type".into()));
        }
        Ok(())
    }
}

/// Which k-way merge combines a leaf's inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeMode {
    /// Numeric k-way merge with duplicate removal. Inputs must each be in default order.
    #[default]
    Sorted,
    /// Per-type concatenation without numeric interleaving.
    Unsorted,
}

/// How per-leaf merge jobs run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Worker threads.
    /// Default: available parallelism
    pub workers: usize,

    /// Jobs queued ahead of the workers before the submitter runs jobs itself.
    /// Default: 2 × workers
    pub queue_capacity: usize,

    /// Merge variant.
    pub mode: MergeMode,

    /// Interval between progress log records, in milliseconds. Zero disables progress logging.
    /// Default: 10,000
    pub progress_interval_ms: u64,

    /// Delete a leaf's inputs once its output is in place.
    /// Default: false
    pub delete_inputs: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism().map_or(1, usize::from);
        Self {
            workers,
            queue_capacity: workers * 2,
            mode: MergeMode::Sorted,
            progress_interval_ms: 10_000,
            delete_inputs: false,
        }
    }
}

impl MergeConfig {
    /// Set the worker count.
    pub fn with_workers(mut self, n: usize) -> Self {
        self.workers = n;
        self
    }

    /// Set the queue capacity.
    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// Set the merge variant.
    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the progress interval.
    pub fn with_progress_interval_ms(mut self, ms: u64) -> Self {
        self.progress_interval_ms = ms;
        self
    }

    /// Enable or disable input deletion.
    pub fn with_delete_inputs(mut self, on: bool) -> Self {
        self.delete_inputs = on;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SplitError::Config("workers must be positive".into()));
        }
        Ok(())
    }
}

mod policy_name {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use terrane_tree::SplitPolicy;

    pub(super) fn serialize<S: Serializer>(p: &SplitPolicy, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(p.name())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<SplitPolicy, D::Error> {
        let name = String::deserialize(d)?;
        SplitPolicy::from_name(&name)
            .ok_or_else(|| D::Error::custom(format!("unknown split policy {name:?}")))
    }
}

mod kinds_bits {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use terrane_io::EntityKinds;

    pub(super) fn serialize<S: Serializer>(k: &EntityKinds, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(k.bits())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<EntityKinds, D::Error> {
        let bits = u8::deserialize(d)?;
        EntityKinds::from_bits(bits)
            .ok_or_else(|| D::Error::custom(format!("unknown entity kinds {bits:#010b}")))
    }
}
