// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: arena structure, splitting, queries, leaf tables.

use alloc::vec::Vec;
use kurbo::{Point, Rect};

use crate::envelope::{self, Axis};
use crate::types::{Leaf, NodeId, Path, ROOT_PATH, SplitPolicy, TreeError};

/// Recursive 2D partition of a bounding envelope.
///
/// Nodes live in a flat arena and refer to their parent and children by [`NodeId`]. The tree only
/// grows: splitting a leaf appends its children, and nothing is ever removed, so the tree can be
/// shared read-only across threads once it has been shaped.
#[derive(Clone)]
pub struct SpatialTree {
    nodes: Vec<Node>,
    policy: SplitPolicy,
}

#[derive(Clone, Debug)]
struct Node {
    envelope: Rect,
    path: Path,
    depth: u8,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl core::fmt::Debug for SpatialTree {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let leaves = self.nodes.iter().filter(|n| n.children.is_empty()).count();
        let depth = self.nodes.iter().map(|n| n.depth).max().unwrap_or(0);
        f.debug_struct("SpatialTree")
            .field("policy", &self.policy)
            .field("root", &self.nodes[0].envelope)
            .field("nodes", &self.nodes.len())
            .field("leaves", &leaves)
            .field("max_depth", &depth)
            .finish_non_exhaustive()
    }
}

impl SpatialTree {
    /// Create a tree consisting of a single root leaf covering `envelope`.
    pub fn new(envelope: Rect, policy: SplitPolicy) -> Result<Self, TreeError> {
        let finite = [envelope.x0, envelope.y0, envelope.x1, envelope.y1]
            .iter()
            .all(|v| v.is_finite());
        if !finite || envelope::is_inverted(&envelope) {
            return Err(TreeError::InvalidEnvelope);
        }
        Ok(Self {
            nodes: alloc::vec![Node {
                envelope,
                path: ROOT_PATH,
                depth: 0,
                parent: None,
                children: Vec::new(),
            }],
            policy,
        })
    }

    /// Create a tree and split it uniformly to `depth` levels.
    pub fn with_depth(envelope: Rect, policy: SplitPolicy, depth: u8) -> Result<Self, TreeError> {
        let mut tree = Self::new(envelope, policy)?;
        tree.split(tree.root(), depth)?;
        Ok(tree)
    }

    /// The root node.
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The split policy this tree was built with.
    pub const fn policy(&self) -> SplitPolicy {
        self.policy
    }

    /// Envelope of the whole tree.
    pub fn root_envelope(&self) -> Rect {
        self.nodes[0].envelope
    }

    /// Total number of nodes (interior and leaves).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.children.is_empty()).count()
    }

    /// Envelope of `id`.
    pub fn envelope(&self, id: NodeId) -> Rect {
        self.node(id).envelope
    }

    /// Path of `id`.
    pub fn path(&self, id: NodeId) -> Path {
        self.node(id).path
    }

    /// Depth of `id` (the root is at depth 0).
    pub fn depth(&self, id: NodeId) -> u8 {
        self.node(id).depth
    }

    /// Parent of `id`, `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of `id` in index order; empty for leaves.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Whether `id` has no children.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.node(id).children.is_empty()
    }

    /// Leaf view of `id`, or `None` if `id` is an interior node.
    pub fn leaf(&self, id: NodeId) -> Option<Leaf> {
        let n = self.node(id);
        n.children.is_empty().then_some(Leaf {
            id,
            path: n.path,
            envelope: n.envelope,
            depth: n.depth,
        })
    }

    /// Split everything below `id` until `levels` levels exist under it.
    ///
    /// Leaves under `id` that are already deep enough are left alone, so splitting an already
    /// refined subtree only deepens its shallow parts.
    pub fn split(&mut self, id: NodeId, levels: u8) -> Result<(), TreeError> {
        let target = u32::from(self.depth(id)) + u32::from(levels);
        if target > u32::from(self.policy.max_depth()) {
            return Err(TreeError::DepthExceeded {
                requested: target,
                max: self.policy.max_depth(),
            });
        }
        self.split_to(id, levels);
        Ok(())
    }

    fn split_to(&mut self, id: NodeId, levels: u8) {
        if levels == 0 {
            return;
        }
        if self.is_leaf(id) {
            self.split_once(id);
        }
        let children = self.node(id).children.clone();
        for child in children {
            self.split_to(child, levels - 1);
        }
    }

    /// Split every current leaf matching `pred` by `levels` levels.
    ///
    /// Returns the number of leaves that were split. The predicate sees the leaves as they were
    /// before any split of this call.
    pub fn split_leaves(
        &mut self,
        mut pred: impl FnMut(&Leaf) -> bool,
        levels: u8,
    ) -> Result<usize, TreeError> {
        let chosen: Vec<Leaf> = self.leaves().into_iter().filter(|l| pred(l)).collect();
        for leaf in &chosen {
            self.split(leaf.id, levels)?;
        }
        Ok(chosen.len())
    }

    fn split_once(&mut self, id: NodeId) {
        let (env, path, depth) = {
            let n = self.node(id);
            (n.envelope, n.path, n.depth)
        };
        let parts: Vec<Rect> = match self.policy {
            SplitPolicy::Alternate => {
                let axis = if depth % 2 == 0 { Axis::Lon } else { Axis::Lat };
                envelope::bisect(&env, axis).to_vec()
            }
            SplitPolicy::Quarter => envelope::quarter(&env).to_vec(),
        };
        let bits = self.policy.bits();
        let mut children = Vec::with_capacity(parts.len());
        for (i, part) in parts.into_iter().enumerate() {
            let child = self.push(Node {
                envelope: part,
                path: (path << bits) | i as u64,
                depth: depth + 1,
                parent: Some(id),
                children: Vec::new(),
            });
            children.push(child);
        }
        self.node_mut(id).children = children;
    }

    /// All leaves whose closed envelope contains `pt`.
    ///
    /// Points outside the root envelope are clamped to its nearest boundary point first, so every
    /// query returns at least one leaf. Interior points yield exactly one leaf; points on shared
    /// boundaries yield every leaf touching them, in enumeration order.
    pub fn query(&self, pt: Point) -> Vec<Leaf> {
        self.query_from(self.root(), pt)
    }

    /// Like [`SpatialTree::query`], descending from `id` and clamping to its envelope.
    pub fn query_from(&self, id: NodeId, pt: Point) -> Vec<Leaf> {
        let pt = envelope::clamp(&self.node(id).envelope, pt);
        let mut out = Vec::new();
        self.collect_point(id, pt, &mut out);
        out
    }

    fn collect_point(&self, id: NodeId, pt: Point, out: &mut Vec<Leaf>) {
        let n = self.node(id);
        if n.children.is_empty() {
            if let Some(leaf) = self.leaf(id) {
                out.push(leaf);
            }
            return;
        }
        for &c in &n.children {
            if envelope::contains(&self.node(c).envelope, pt) {
                self.collect_point(c, pt, out);
            }
        }
    }

    /// The single leaf a point is assigned to: the first leaf [`SpatialTree::query`] would return.
    pub fn locate(&self, pt: Point) -> Leaf {
        let root = self.root();
        let pt = envelope::clamp(&self.node(root).envelope, pt);
        let mut id = root;
        loop {
            let n = self.node(id);
            if n.children.is_empty() {
                return Leaf {
                    id,
                    path: n.path,
                    envelope: n.envelope,
                    depth: n.depth,
                };
            }
            id = n
                .children
                .iter()
                .copied()
                .find(|&c| envelope::contains(&self.node(c).envelope, pt))
                .unwrap_or_else(|| self.nearest_child(id, pt));
        }
    }

    // Rounding can leave a hairline gap between children; fall back to the nearest one.
    fn nearest_child(&self, id: NodeId, pt: Point) -> NodeId {
        let mut best = self.node(id).children[0];
        let mut best_d = f64::INFINITY;
        for &c in &self.node(id).children {
            let q = envelope::clamp(&self.node(c).envelope, pt);
            let d = (q - pt).hypot2();
            if d < best_d {
                best = c;
                best_d = d;
            }
        }
        best
    }

    /// All leaves whose closed envelope intersects `rect`, in enumeration order.
    pub fn query_rect(&self, rect: Rect) -> Vec<Leaf> {
        let mut out = Vec::new();
        if envelope::intersects(&self.node(self.root()).envelope, &rect) {
            self.collect_rect(self.root(), &rect, &mut out);
        }
        out
    }

    fn collect_rect(&self, id: NodeId, rect: &Rect, out: &mut Vec<Leaf>) {
        let n = self.node(id);
        if n.children.is_empty() {
            if let Some(leaf) = self.leaf(id) {
                out.push(leaf);
            }
            return;
        }
        for &c in &n.children {
            if envelope::intersects(&self.node(c).envelope, rect) {
                self.collect_rect(c, rect, out);
            }
        }
    }

    /// All leaves in stable depth-first order (children visited in index order).
    ///
    /// Two trees with the same root envelope, policy and leaf paths enumerate identically, which
    /// lets independent passes process leaves in the same order.
    pub fn leaves(&self) -> Vec<Leaf> {
        self.leaves_under(self.root())
    }

    /// Leaves below `id` (or `id` itself if it is a leaf), in stable order.
    pub fn leaves_under(&self, id: NodeId) -> Vec<Leaf> {
        let mut out = Vec::new();
        let mut stack = alloc::vec![id];
        while let Some(cur) = stack.pop() {
            let n = self.node(cur);
            if n.children.is_empty() {
                if let Some(leaf) = self.leaf(cur) {
                    out.push(leaf);
                }
            } else {
                stack.extend(n.children.iter().rev().copied());
            }
        }
        out
    }

    /// Paths of all leaves in enumeration order.
    pub fn leaf_paths(&self) -> Vec<Path> {
        self.leaves().into_iter().map(|l| l.path).collect()
    }

    /// Find the node with the given path.
    pub fn node_by_path(&self, path: Path) -> Option<NodeId> {
        let route = decode_route(path, self.policy).ok()?;
        let mut id = self.root();
        for idx in route {
            id = *self.node(id).children.get(idx)?;
        }
        Some(id)
    }

    /// Find the leaf with the given path; `None` if absent or interior.
    pub fn leaf_by_path(&self, path: Path) -> Option<Leaf> {
        self.node_by_path(path).and_then(|id| self.leaf(id))
    }

    /// Rebuild a tree from its root envelope, policy and leaf paths.
    ///
    /// This is the inverse of [`SpatialTree::leaf_paths`]: the rebuilt tree has identical node
    /// envelopes, paths and leaf enumeration order. The table must describe a tiling: no path
    /// may be an ancestor of another and no leaf may be missing.
    pub fn from_leaf_paths(
        envelope: Rect,
        policy: SplitPolicy,
        paths: &[Path],
    ) -> Result<Self, TreeError> {
        let mut tree = Self::new(envelope, policy)?;
        for &path in paths {
            let route = decode_route(path, policy)?;
            let mut id = tree.root();
            for idx in route {
                if tree.is_leaf(id) {
                    tree.split_once(id);
                }
                id = tree.node(id).children[idx];
            }
        }
        for &path in paths {
            if tree.leaf_by_path(path).is_none() {
                return Err(TreeError::InconsistentLeaves(path));
            }
        }
        let mut sorted: Vec<Path> = paths.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        if let Some(extra) = tree
            .leaves()
            .into_iter()
            .find(|l| sorted.binary_search(&l.path).is_err())
        {
            return Err(TreeError::InconsistentLeaves(extra.path));
        }
        Ok(tree)
    }

    fn push(&mut self, node: Node) -> NodeId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "NodeId uses 32-bit indices; depth limits keep trees far below that."
        )]
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.idx()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.idx()]
    }
}

/// Decode a path into child indices from the root down.
pub fn decode_route(path: Path, policy: SplitPolicy) -> Result<Vec<usize>, TreeError> {
    if path == 0 {
        return Err(TreeError::InvalidPath(path));
    }
    let bits = policy.bits();
    let width = Path::BITS - 1 - path.leading_zeros();
    if width % bits != 0 {
        return Err(TreeError::InvalidPath(path));
    }
    let depth = width / bits;
    let mask = (1_u64 << bits) - 1;
    let mut route = Vec::with_capacity(depth as usize);
    for level in 0..depth {
        let shift = bits * (depth - 1 - level);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "masked to at most two bits."
        )]
        route.push(((path >> shift) & mask) as usize);
    }
    Ok(route)
}
