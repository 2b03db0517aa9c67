// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=terrane_tree --heading-base-level=0

//! Terrane Tree: a Kurbo-native spatial partition tree.
//!
//! Terrane Tree recursively divides a bounding envelope into leaves so that datasets too large for
//! memory can be processed one region at a time.
//!
//! - Split a root envelope uniformly to a target depth, or refine only the leaves that a counting
//!   pass found too full.
//! - Answer point-containment and rectangle-intersection queries.
//! - Enumerate leaves in a stable order and identify them by a route-encoding [`Path`] that is
//!   identical across runs, so it can be used as a partition key and file name.
//!
//! The tree is shaped once and then only read. It is `Send + Sync`, so one instance can be shared
//! by every distribution and merge worker.
//!
//! ## Coordinates
//!
//! Envelopes are [`kurbo::Rect`] values with `x` as longitude and `y` as latitude. All containment
//! tests are closed on every side (see [`envelope`]). Float inputs are assumed to be finite.
//!
//! ## Out-of-root points
//!
//! Querying a point outside the root envelope is not an error: the point is clamped to the nearest
//! point of the root envelope, and the leaves on that boundary are returned.
//!
//! ## Paths
//!
//! The root has path `1`. Each split appends the child index to the parent's path, one bit per
//! level for [`SplitPolicy::Alternate`] and two bits for [`SplitPolicy::Quarter`]. A tree can be
//! rebuilt from its root envelope, policy and leaf paths with [`SpatialTree::from_leaf_paths`].
//!
//! ## Minimal usage
//!
//! ```
//! use kurbo::{Point, Rect};
//! use terrane_tree::{SpatialTree, SplitPolicy};
//!
//! let world = Rect::new(-180.0, -90.0, 180.0, 90.0);
//! let tree = SpatialTree::with_depth(world, SplitPolicy::Quarter, 2).unwrap();
//! assert_eq!(tree.leaf_count(), 16);
//!
//! // An interior point belongs to exactly one leaf.
//! let hits = tree.query(Point::new(13.4, 52.5));
//! assert_eq!(hits.len(), 1);
//! assert_eq!(tree.locate(Point::new(13.4, 52.5)).path, hits[0].path);
//!
//! // Paths rebuild the same tree.
//! let paths = tree.leaf_paths();
//! let again = SpatialTree::from_leaf_paths(world, SplitPolicy::Quarter, &paths).unwrap();
//! assert_eq!(again.leaf_paths(), paths);
//! ```

#![no_std]

extern crate alloc;

pub mod envelope;
mod tree;
mod types;

pub use tree::{SpatialTree, decode_route};
pub use types::{Leaf, NodeId, Path, ROOT_PATH, SplitPolicy, TreeError};
