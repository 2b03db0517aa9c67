// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect};
use terrane_tree::{SpatialTree, SplitPolicy};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn world() -> Rect {
    Rect::new(-180.0, -90.0, 180.0, 90.0)
}

fn gen_points(count: usize) -> Vec<Point> {
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    (0..count)
        .map(|_| Point::new(rng.next_f64() * 360.0 - 180.0, rng.next_f64() * 180.0 - 90.0))
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");
    for policy in [SplitPolicy::Alternate, SplitPolicy::Quarter] {
        let depth = if policy == SplitPolicy::Quarter { 6 } else { 12 };
        group.bench_function(format!("{}_depth{}", policy.name(), depth), |b| {
            b.iter(|| {
                let tree = SpatialTree::with_depth(world(), policy, depth).unwrap();
                black_box(tree.leaf_count());
            });
        });
    }
    group.finish();
}

fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_locate");
    let points = gen_points(10_000);
    group.throughput(Throughput::Elements(points.len() as u64));
    let configs = [
        (SplitPolicy::Quarter, 2),
        (SplitPolicy::Quarter, 4),
        (SplitPolicy::Quarter, 6),
        (SplitPolicy::Alternate, 4),
        (SplitPolicy::Alternate, 8),
        (SplitPolicy::Alternate, 12),
    ];
    for (policy, depth) in configs {
        let tree = SpatialTree::with_depth(world(), policy, depth).unwrap();
        group.bench_function(format!("{}_depth{depth}", policy.name()), |b| {
            b.iter(|| {
                let mut acc = 0_u64;
                for p in &points {
                    acc ^= tree.locate(*p).path;
                }
                black_box(acc);
            });
        });
    }
    group.finish();
}

fn bench_query_rect(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_query_rect");
    let tree = SpatialTree::with_depth(world(), SplitPolicy::Quarter, 6).unwrap();
    for size in [1.0, 10.0, 90.0] {
        let mut rng = Rng::new(0xBADC_F00D_1234_5678);
        let rects: Vec<_> = (0..1_000)
            .map(|_| {
                let x0 = rng.next_f64() * (360.0 - size) - 180.0;
                let y0 = rng.next_f64() * (180.0 - size) - 90.0;
                Rect::new(x0, y0, x0 + size, y0 + size)
            })
            .collect();
        group.bench_function(format!("quarter_depth6_size{size}"), |b| {
            b.iter_batched(
                || rects.clone(),
                |rects| {
                    let hits: usize = rects.iter().map(|r| tree.query_rect(*r).len()).sum();
                    black_box(hits);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_refine(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_refine");
    let points = gen_points(50_000);
    group.bench_function("split_crowded_leaves", |b| {
        b.iter_batched(
            || SpatialTree::with_depth(world(), SplitPolicy::Alternate, 4).unwrap(),
            |mut tree| {
                let mut crowded = std::collections::HashSet::new();
                for p in points.iter().take(64) {
                    crowded.insert(tree.locate(*p).path);
                }
                let split = tree
                    .split_leaves(|leaf| crowded.contains(&leaf.path), 4)
                    .unwrap();
                black_box(split);
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_locate, bench_query_rect, bench_refine);
criterion_main!(benches);
