// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Text persistence of a partition tree.
//!
//! ```text
//! terrane-tree 1
//! policy quarter
//! root -180 -90 180 90
//! leaf 4
//! leaf 14
//! ...
//! ```
//!
//! The root line lists `x0 y0 x1 y1`; leaf paths are hex. Reading rebuilds the tree with
//! [`SpatialTree::from_leaf_paths`], so a tree shaped by a counting pass can drive later passes.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use kurbo::Rect;
use terrane_tree::{SpatialTree, SplitPolicy};

use crate::error::{IoError, Result};

const HEADER: &str = "terrane-tree 1";

/// Write `tree` to `w`.
pub fn write_tree_to<W: Write>(tree: &SpatialTree, mut w: W) -> Result<()> {
    let r = tree.root_envelope();
    writeln!(w, "{HEADER}")?;
    writeln!(w, "policy {}", tree.policy().name())?;
    writeln!(w, "root {} {} {} {}", r.x0, r.y0, r.x1, r.y1)?;
    for p in tree.leaf_paths() {
        writeln!(w, "leaf {p:x}")?;
    }
    w.flush()?;
    Ok(())
}

/// Read a tree written by [`write_tree_to`].
pub fn read_tree_from<R: BufRead>(r: R) -> Result<SpatialTree> {
    let mut lines = r.lines();
    let mut next = |what: &str| -> Result<String> {
        lines
            .next()
            .transpose()?
            .ok_or_else(|| IoError::Format(format!("tree file ends before {what}")))
    };
    if next("header")?.trim() != HEADER {
        return Err(IoError::Format("not a tree file".into()));
    }
    let policy_line = next("policy")?;
    let policy = policy_line
        .strip_prefix("policy ")
        .and_then(|n| SplitPolicy::from_name(n.trim()))
        .ok_or_else(|| IoError::Format(format!("bad policy line {policy_line:?}")))?;
    let root_line = next("root")?;
    let root = parse_root(&root_line)
        .ok_or_else(|| IoError::Format(format!("bad root line {root_line:?}")))?;

    let mut paths = Vec::new();
    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let p = line
            .strip_prefix("leaf ")
            .and_then(|h| u64::from_str_radix(h.trim(), 16).ok())
            .ok_or_else(|| IoError::Format(format!("bad leaf line {line:?}")))?;
        paths.push(p);
    }
    Ok(SpatialTree::from_leaf_paths(root, policy, &paths)?)
}

fn parse_root(line: &str) -> Option<Rect> {
    let rest = line.strip_prefix("root ")?;
    let v: Vec<f64> = rest
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match v[..] {
        [x0, y0, x1, y1] => Some(Rect::new(x0, y0, x1, y1)),
        _ => None,
    }
}

/// Write `tree` to a new file at `path`.
pub fn write_tree(tree: &SpatialTree, path: &Path) -> Result<()> {
    write_tree_to(tree, BufWriter::new(File::create(path)?))?;
    tracing::debug!(path = %path.display(), leaves = tree.leaf_count(), "wrote tree");
    Ok(())
}

/// Read the tree file at `path`.
pub fn read_tree(path: &Path) -> Result<SpatialTree> {
    read_tree_from(BufReader::new(File::open(path)?))
}
