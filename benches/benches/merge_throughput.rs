// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use terrane_io::build::node;
use terrane_io::{EntityContainer, IdListReader, IdListWriter, VecSink, VecSource, copy_stream};
use terrane_split::{LeafSorter, SortedMerge, UnsortedMerge};

/// `k` sorted node runs; run `i` holds every id congruent to `i` mod `k`, plus every tenth id of
/// run 0 so the sorted merge has duplicates to drop.
fn gen_runs(k: usize, per_run: usize) -> Vec<Vec<EntityContainer>> {
    (0..k)
        .map(|i| {
            (0..per_run)
                .flat_map(|j| {
                    let id = (j * k + i) as i64;
                    let dup = (i > 0 && j % 10 == 0).then(|| node((j * k) as i64, 0.0, 0.0));
                    dup.into_iter().chain([node(id, 0.0, 0.0)])
                })
                .collect()
        })
        .collect()
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("stream_merge");
    for k in [2_usize, 8, 32] {
        let runs = gen_runs(k, 20_000 / k);
        let total: usize = runs.iter().map(Vec::len).sum();
        group.throughput(Throughput::Elements(total as u64));

        group.bench_function(format!("sorted_k{k}"), |b| {
            b.iter_batched(
                || runs.iter().cloned().map(VecSource::new).collect::<Vec<_>>(),
                |sources| {
                    let merge = SortedMerge::new(sources).unwrap();
                    let mut sink = VecSink::new();
                    black_box(copy_stream(merge, &mut sink).unwrap());
                },
                BatchSize::LargeInput,
            );
        });

        group.bench_function(format!("unsorted_k{k}"), |b| {
            b.iter_batched(
                || runs.iter().cloned().map(VecSource::new).collect::<Vec<_>>(),
                |sources| {
                    let merge = UnsortedMerge::new(sources).unwrap();
                    let mut sink = VecSink::new();
                    black_box(copy_stream(merge, &mut sink).unwrap());
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_leaf_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("leaf_sort");
    let shuffled: Vec<_> = (0..50_000_i64)
        .map(|i| node((i * 7_919) % 50_000, 0.0, 0.0))
        .collect();
    group.throughput(Throughput::Elements(shuffled.len() as u64));
    group.bench_function("nodes_50k", |b| {
        b.iter_batched(
            || VecSource::new(shuffled.clone()),
            |source| {
                let mut sink = VecSink::new();
                black_box(LeafSorter::new(true).sort(source, &mut sink).unwrap());
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

fn bench_id_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("compact_id_list");
    let ids: Vec<i64> = (0..100_000_i64).map(|i| i * 3 + (i % 5)).collect();
    group.throughput(Throughput::Elements(ids.len() as u64));
    group.bench_function("encode_100k", |b| {
        b.iter(|| {
            let mut w = IdListWriter::new(Vec::new());
            for &id in &ids {
                w.write(id).unwrap();
            }
            black_box(w.finish().unwrap().len());
        });
    });
    let mut w = IdListWriter::new(Vec::new());
    for &id in &ids {
        w.write(id).unwrap();
    }
    let bytes = w.finish().unwrap();
    group.bench_function("decode_100k", |b| {
        b.iter(|| {
            let n = IdListReader::new(bytes.as_slice())
                .map(Result::unwrap)
                .count();
            black_box(n);
        });
    });
    group.finish();
}

criterion_group!(benches, bench_merge, bench_leaf_sort, bench_id_list);
criterion_main!(benches);
