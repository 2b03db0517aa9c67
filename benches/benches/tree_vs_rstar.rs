// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

#![cfg(feature = "compare_rstar")]

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect};
use terrane_tree::{SpatialTree, SplitPolicy};

use rstar::primitives::Rectangle;
use rstar::{AABB, RTree};

fn leaf_rects(tree: &SpatialTree) -> Vec<Rectangle<[f64; 2]>> {
    tree.leaves()
        .iter()
        .map(|l| {
            let r = l.envelope;
            Rectangle::from_corners([r.x0, r.y0], [r.x1, r.y1])
        })
        .collect()
}

fn grid_points(n: usize) -> Vec<Point> {
    let mut out = Vec::with_capacity(n * n);
    for y in 0..n {
        for x in 0..n {
            out.push(Point::new(
                -180.0 + (x as f64 + 0.37) * 360.0 / n as f64,
                -90.0 + (y as f64 + 0.61) * 180.0 / n as f64,
            ));
        }
    }
    out
}

fn bench_tree_vs_rstar(c: &mut Criterion) {
    let world = Rect::new(-180.0, -90.0, 180.0, 90.0);
    let mut group = c.benchmark_group("leaf_lookup_vs_rstar");
    for depth in [3_u8, 5, 7] {
        let tree = SpatialTree::with_depth(world, SplitPolicy::Quarter, depth).unwrap();
        let rects = leaf_rects(&tree);
        let rtree = RTree::bulk_load(rects.clone());
        let points = grid_points(100);
        group.throughput(Throughput::Elements(points.len() as u64));

        group.bench_function(format!("terrane_locate_depth{depth}"), |b| {
            b.iter(|| {
                let mut acc = 0_u64;
                for p in &points {
                    acc ^= tree.locate(*p).path;
                }
                black_box(acc);
            });
        });

        group.bench_function(format!("rstar_locate_depth{depth}"), |b| {
            b.iter(|| {
                let mut hits = 0_usize;
                for p in &points {
                    hits += rtree.locate_all_at_point(&[p.x, p.y]).count();
                }
                black_box(hits);
            });
        });

        let query = Rect::new(-20.0, -10.0, 40.0, 30.0);
        group.bench_function(format!("terrane_query_rect_depth{depth}"), |b| {
            b.iter(|| black_box(tree.query_rect(query).len()));
        });
        group.bench_function(format!("rstar_build_query_depth{depth}"), |b| {
            b.iter_batched(
                || rects.clone(),
                |rects| {
                    let rtree = RTree::bulk_load(rects);
                    let aabb = AABB::from_corners([query.x0, query.y0], [query.x1, query.y1]);
                    black_box(rtree.locate_in_envelope_intersecting(&aabb).count());
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tree_vs_rstar);
criterion_main!(benches);
