// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spatial tree basics.
//!
//! Split the world into quadrants, refine one of them, and look up points and rectangles.
//!
//! Run:
//! - `cargo run -p terrane_demos --example tree_basics`

use kurbo::{Point, Rect};
use terrane_tree::{SpatialTree, SplitPolicy};

fn main() {
    let world = Rect::new(-180.0, -90.0, 180.0, 90.0);
    let mut tree = SpatialTree::with_depth(world, SplitPolicy::Quarter, 1).unwrap();

    // Refine the north-east quadrant by two more levels.
    let berlin = Point::new(13.4, 52.5);
    let ne = tree.locate(berlin).path;
    let split = tree.split_leaves(|leaf| leaf.path == ne, 2).unwrap();
    println!("split {split} leaf, now {} leaves", tree.leaf_count());

    for leaf in tree.leaves() {
        println!(
            "leaf {:>6x} depth {} envelope {:?}",
            leaf.path, leaf.depth, leaf.envelope
        );
    }

    let leaf = tree.locate(berlin);
    println!("{berlin:?} is in leaf {:x}", leaf.path);
    assert_eq!(leaf.depth, 3, "refined quadrant should be three levels deep");

    // A point on the prime meridian and equator touches four leaves.
    let origin = tree.query(Point::ORIGIN);
    println!("origin touches {} leaves", origin.len());

    // Out-of-root points are clamped onto the boundary.
    let far = tree.locate(Point::new(500.0, 0.5));
    println!("(500, 0.5) clamps into leaf {:x}", far.path);

    let europe = Rect::new(-10.0, 35.0, 30.0, 70.0);
    let hits: Vec<_> = tree.query_rect(europe).iter().map(|l| l.path).collect();
    println!("europe intersects leaves {hits:x?}");
}
