// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! End-to-end partitioning of two synthetic datasets.
//!
//! Shape a tree by counting, distribute both datasets into leaf files, sort every leaf and
//! merge the two datasets leaf by leaf on a worker pool. Set `RUST_LOG=debug` for per-leaf logs.
//!
//! Run:
//! - `cargo run -p terrane_demos --example partition_pipeline`

use kurbo::Rect;
use terrane_io::build::{node, way};
use terrane_io::{EntityContainer, EntityType, LeafDirs, VecSource, write_tree};
use terrane_split::{
    DistributeConfig, ExtentMode, FileSinkFactory, LeafSorter, MergeConfig, TreeConfig,
    build_tree, collect_references, distribute_threaded, merge_leaves, plan_leaf_merges,
    sort_leaf_file,
};
use terrane_tree::SplitPolicy;
use tracing_subscriber::EnvFilter;

const FILE: &str = "entities.trn";

/// Nodes clustered around a few cities, with ids `first..first + count`.
fn synthetic(first: i64, count: i64) -> Vec<EntityContainer> {
    let cities = [(13.4, 52.5), (2.35, 48.85), (-74.0, 40.7), (139.7, 35.7)];
    let mut out: Vec<_> = (first..first + count)
        .map(|id| {
            let (lon, lat) = cities[(id % 4) as usize];
            let jitter = (id % 97) as f64 * 0.01;
            node(id, lon + jitter, lat - jitter)
        })
        .collect();
    out.push(way(first, &[first, first + 4, first + 8]));
    out
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let scratch = tempfile::tempdir()?;
    let world = Rect::new(-180.0, -90.0, 180.0, 90.0);
    let inputs = [synthetic(0, 20_000), synthetic(15_000, 20_000)];

    let config = TreeConfig::default()
        .with_split(SplitPolicy::Quarter)
        .with_initial_depth(2)
        .with_max_leaf_entities(2_000);
    let tree = build_tree(world, &config, || {
        Ok(VecSource::new(inputs.iter().flatten().cloned().collect()))
    })?;
    write_tree(&tree, &scratch.path().join("tree.txt"))?;

    let mut datasets = Vec::new();
    for (i, input) in inputs.into_iter().enumerate() {
        let dirs = LeafDirs::new(scratch.path().join(format!("dataset-{i}")));
        let config = DistributeConfig::default();
        distribute_threaded(
            &tree,
            FileSinkFactory::create(dirs.clone(), FILE, &config)?,
            config,
            ExtentMode::Skip,
            VecSource::new(input),
        )?;
        for leaf in dirs.list_leaves()? {
            sort_leaf_file(&dirs.leaf_file(leaf, FILE), &LeafSorter::new(true))?;
        }
        datasets.push(dirs);
    }

    let out = LeafDirs::new(scratch.path().join("merged"));
    let jobs = plan_leaf_merges(&datasets, FILE, &out)?;
    let stats = merge_leaves(jobs, &MergeConfig::default().with_progress_interval_ms(50))?;
    println!(
        "merged {} leaves: {} entities, {} duplicates dropped in {:?}",
        stats.leaves_done, stats.entities_written, stats.duplicates_dropped, stats.elapsed
    );

    let mut missing = 0;
    for leaf in out.list_leaves()? {
        let refs = collect_references(terrane_io::open_entity_file(&out.leaf_file(leaf, FILE))?)?;
        missing += refs.missing(EntityType::Node).len();
    }
    println!("nodes referenced outside their leaf: {missing}");
    Ok(())
}
