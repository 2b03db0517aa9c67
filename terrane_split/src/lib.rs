// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Terrane Split: partition large entity datasets by region, sort each region in memory, and
//! merge regions from several datasets.
//!
//! A run has four stages, each reading and writing through [`terrane_io`] streams:
//!
//! 1. **Shape.** [`build_tree`] counts nodes per leaf with a [`LeafCounter`] and splits crowded
//!    leaves until every leaf fits the [`TreeConfig`] limit.
//! 2. **Distribute.** A [`LeafDistributor`] routes every entity to the leaf (or leaves) it falls
//!    in, writing one output per leaf through a [`SinkFactory`]. [`distribute_threaded`] decodes
//!    the input on a separate thread.
//! 3. **Sort.** [`sort_leaf_file`] puts one leaf into default order in memory.
//! 4. **Merge.** [`plan_leaf_merges`] pairs up the leaves of several datasets and
//!    [`merge_leaves`] runs a [`SortedMerge`] or [`UnsortedMerge`] per leaf on a worker pool.
//!
//! [`ReferenceCollector`] reports ids a leaf refers to but does not contain.
//!
//! Every stage fails fast: the first error stops the stage's threads and is returned as a
//! [`SplitError`].
//!
//! ```
//! use terrane_io::build::{node, way};
//! use terrane_io::{VecSink, VecSource, copy_stream};
//! use terrane_split::{LeafSorter, SortedMerge};
//!
//! // Two sorted leaves from different datasets, sharing node 2.
//! let mut a = VecSink::new();
//! LeafSorter::new(true)
//!     .sort(VecSource::new(vec![way(9, &[1]), node(2, 0.0, 0.0), node(1, 0.0, 0.0)]), &mut a)
//!     .unwrap();
//! let b = VecSource::new(vec![node(2, 0.0, 0.0), node(3, 0.0, 0.0)]);
//!
//! let merge = SortedMerge::new(vec![VecSource::new(a.entities), b]).unwrap();
//! let mut out = VecSink::new();
//! copy_stream(merge, &mut out).unwrap();
//! assert_eq!(out.ids(), [1, 2, 3, 9]);
//! ```

mod bridged;
mod config;
mod counter;
mod distributor;
mod error;
mod merge;
mod merge_leaves;
mod references;
mod sorter;

pub use config::{DistributeConfig, MergeConfig, MergeMode, TreeConfig};
pub use counter::{LeafCounter, build_tree, count_threaded};
pub use distributor::{
    DistributionStats, ExtentMode, FileSinkFactory, LeafDistributor, SinkFactory,
    distribute_threaded,
};
pub use error::{Result, SplitError};
pub use merge::{MergeStats, SortedMerge, UnsortedMerge};
pub use merge_leaves::{
    LeafMergeJob, RunStats, merge_leaf, merge_leaves, merge_leaves_sequential, plan_leaf_merges,
};
pub use references::{ReferenceCollector, collect_references};
pub use sorter::{LeafSorter, SortStats, sort_leaf_file};
