// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the partition tree: node identifiers, leaf views, split policies, errors.

use core::fmt;

use kurbo::Rect;

/// Identifier for a node in a [`SpatialTree`](crate::SpatialTree).
///
/// This is a small, copyable index into the tree's node arena. Nodes are never removed, so a
/// `NodeId` handed out by a tree stays valid for the lifetime of that tree. It is meaningless for
/// any other tree; use [`Leaf::path`] to identify a region across trees and across runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    /// Raw arena index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

/// Route from the root to a node, packed into an integer.
///
/// The root has path `1`. A child's path is `(parent << bits) | child_index` where `bits` is
/// [`SplitPolicy::bits`]. The leading `1` marks where the route starts, so paths at different
/// depths never collide and the route can be decoded without the tree.
pub type Path = u64;

/// Path of the root node.
pub const ROOT_PATH: Path = 1;

/// A terminal region of the partition.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Leaf {
    /// Arena id of the node.
    pub id: NodeId,
    /// Stable route identifier, used as partition key and file name.
    pub path: Path,
    /// Closed envelope (x = longitude, y = latitude).
    pub envelope: Rect,
    /// Number of splits between the root and this leaf.
    pub depth: u8,
}

/// How a node is divided when split.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SplitPolicy {
    /// Bisect along longitude at even depths and along latitude at odd depths.
    #[default]
    Alternate,
    /// Divide into four quadrants at every level.
    Quarter,
}

impl SplitPolicy {
    /// Number of path bits consumed per level.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Alternate => 1,
            Self::Quarter => 2,
        }
    }

    /// Number of children produced by one split.
    pub const fn arity(self) -> usize {
        1 << self.bits()
    }

    /// Deepest level whose paths still fit in a [`Path`].
    pub const fn max_depth(self) -> u8 {
        match self {
            Self::Alternate => 63,
            Self::Quarter => 31,
        }
    }

    /// Stable lowercase name, used by tree files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Alternate => "alternate",
            Self::Quarter => "quarter",
        }
    }

    /// Inverse of [`SplitPolicy::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "alternate" => Some(Self::Alternate),
            "quarter" => Some(Self::Quarter),
            _ => None,
        }
    }
}

/// Errors raised while shaping a tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeError {
    /// Splitting would create nodes deeper than [`SplitPolicy::max_depth`].
    DepthExceeded {
        /// Requested depth.
        requested: u32,
        /// Deepest supported depth.
        max: u8,
    },
    /// A path does not encode a route for this policy (for example `0`).
    InvalidPath(Path),
    /// A leaf table does not describe a tiling: some path is an interior node of another.
    InconsistentLeaves(Path),
    /// The root envelope is inverted or not finite.
    InvalidEnvelope,
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DepthExceeded { requested, max } => {
                write!(f, "split depth {requested} exceeds maximum depth {max}")
            }
            Self::InvalidPath(path) => write!(f, "invalid tree path {path:#x}"),
            Self::InconsistentLeaves(path) => {
                write!(f, "leaf {path:#x} overlaps another leaf of the table")
            }
            Self::InvalidEnvelope => f.write_str("root envelope is empty or not finite"),
        }
    }
}

impl core::error::Error for TreeError {}
