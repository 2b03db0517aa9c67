// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Merging the leaves of several partitioned datasets, one independent job per leaf.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use terrane_io::{LeafDirs, copy_stream, create_entity_file, open_entity_file};
use terrane_sync::{Ticker, WorkerPool};
use terrane_tree::{Path, ROOT_PATH};

use crate::config::{MergeConfig, MergeMode};
use crate::error::{Result, SplitError, ensure_output_dir};
use crate::merge::{MergeStats, SortedMerge, UnsortedMerge};

/// The inputs and output of one leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafMergeJob {
    /// Leaf path.
    pub leaf: Path,
    /// The leaf's file in each dataset that has one, in dataset order.
    pub inputs: Vec<PathBuf>,
    /// Merged file.
    pub output: PathBuf,
}

/// One job per leaf present in any of `datasets`, each reading `file_name` and writing
/// `file_name` under `out`.
///
/// All datasets must have been distributed with the same tree: a leaf of one dataset that is an
/// ancestor of a leaf of another is a [`SplitError::Precondition`]. So is an `out` root that
/// already has entries; it is created if missing.
pub fn plan_leaf_merges(
    datasets: &[LeafDirs],
    file_name: &str,
    out: &LeafDirs,
) -> Result<Vec<LeafMergeJob>> {
    let mut leaves = BTreeSet::new();
    for dirs in datasets {
        leaves.extend(dirs.list_leaves()?);
    }
    for &leaf in &leaves {
        let mut up = leaf >> 1;
        while up >= ROOT_PATH {
            if leaves.contains(&up) {
                return Err(SplitError::Precondition(format!(
                    "leaf {leaf:x} lies under leaf {up:x}; datasets were split by different trees"
                )));
            }
            up >>= 1;
        }
    }
    ensure_output_dir(out.root())?;
    Ok(leaves
        .into_iter()
        .map(|leaf| LeafMergeJob {
            leaf,
            inputs: datasets
                .iter()
                .map(|d| d.leaf_file(leaf, file_name))
                .filter(|p| p.is_file())
                .collect(),
            output: out.leaf_file(leaf, file_name),
        })
        .collect())
}

/// Merge one leaf.
///
/// The merged stream goes to `<output>.tmp`, which is renamed to `output` only after it is
/// complete; on failure the temporary file is removed and no output exists. Inputs are deleted
/// after the rename when `delete_inputs` is set.
pub fn merge_leaf(job: &LeafMergeJob, mode: MergeMode, delete_inputs: bool) -> Result<MergeStats> {
    if let Some(dir) = job.output.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut tmp_name = job.output.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    let merged = write_merged(job, mode, &tmp);
    let stats = match merged {
        Ok(stats) => stats,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            tracing::error!(leaf = format_args!("{:x}", job.leaf), error = %e, "leaf merge failed");
            return Err(e);
        }
    };
    fs::rename(&tmp, &job.output)?;
    if delete_inputs {
        for input in &job.inputs {
            fs::remove_file(input)?;
        }
    }
    tracing::debug!(
        leaf = format_args!("{:x}", job.leaf),
        inputs = job.inputs.len(),
        entities = stats.emitted,
        duplicates = stats.duplicates,
        "merged leaf"
    );
    Ok(stats)
}

fn write_merged(job: &LeafMergeJob, mode: MergeMode, tmp: &std::path::Path) -> Result<MergeStats> {
    let readers = job
        .inputs
        .iter()
        .map(|p| open_entity_file(p))
        .collect::<terrane_io::Result<Vec<_>>>()?;
    let mut writer = create_entity_file(tmp)?;
    match mode {
        MergeMode::Sorted => {
            let mut merge = SortedMerge::new(readers)?;
            copy_stream(&mut merge, &mut writer)?;
            Ok(merge.stats())
        }
        MergeMode::Unsorted => {
            let mut merge = UnsortedMerge::new(readers)?;
            copy_stream(&mut merge, &mut writer)?;
            Ok(merge.stats())
        }
    }
}

/// Counters of a whole merge run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Leaves planned.
    pub leaves_total: u64,
    /// Leaves whose output is in place.
    pub leaves_done: u64,
    /// Entities written over all leaves.
    pub entities_written: u64,
    /// Duplicate entities dropped over all leaves.
    pub duplicates_dropped: u64,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl RunStats {
    fn record(&mut self, leaf: MergeStats) {
        self.leaves_done += 1;
        self.entities_written += leaf.emitted;
        self.duplicates_dropped += leaf.duplicates;
    }
}

struct Progress {
    stats: Mutex<RunStats>,
    start: Instant,
}

impl Progress {
    fn new(leaves_total: usize) -> Arc<Self> {
        Arc::new(Self {
            stats: Mutex::new(RunStats {
                leaves_total: leaves_total as u64,
                ..RunStats::default()
            }),
            start: Instant::now(),
        })
    }

    fn ticker(self: &Arc<Self>, config: &MergeConfig) -> Result<Option<Ticker>> {
        if config.progress_interval_ms == 0 {
            return Ok(None);
        }
        let progress = Arc::clone(self);
        let ticker = Ticker::start(
            "merge-progress",
            Duration::from_millis(config.progress_interval_ms),
            move |_| {
                let stats = *progress.stats.lock();
                tracing::info!(
                    leaves_done = stats.leaves_done,
                    leaves_total = stats.leaves_total,
                    elapsed_ms = progress.start.elapsed().as_millis(),
                    "merge progress"
                );
            },
        )?;
        Ok(Some(ticker))
    }

    fn finish(&self) -> RunStats {
        let mut stats = *self.stats.lock();
        stats.elapsed = self.start.elapsed();
        tracing::info!(
            leaves = stats.leaves_done,
            entities = stats.entities_written,
            duplicates = stats.duplicates_dropped,
            elapsed_ms = stats.elapsed.as_millis(),
            "merge complete"
        );
        stats
    }
}

/// Merge every job on a [`WorkerPool`] of `config.workers` threads.
///
/// Jobs are independent, so output content does not depend on scheduling. The first failing job
/// aborts the run: jobs not yet started are skipped and its error is returned. Leaves completed
/// before the failure keep their outputs.
pub fn merge_leaves(jobs: Vec<LeafMergeJob>, config: &MergeConfig) -> Result<RunStats> {
    config.validate()?;
    let _span = tracing::info_span!("merge_leaves", workers = config.workers, mode = ?config.mode)
        .entered();
    let progress = Progress::new(jobs.len());
    let ticker = progress.ticker(config)?;

    let pool = WorkerPool::<SplitError>::new("merge", config.workers, config.queue_capacity)?;
    let (mode, delete_inputs) = (config.mode, config.delete_inputs);
    for job in jobs {
        let progress = Arc::clone(&progress);
        let submitted = pool.submit(move || {
            let leaf = merge_leaf(&job, mode, delete_inputs)?;
            progress.stats.lock().record(leaf);
            Ok(())
        });
        if submitted.is_err() {
            break;
        }
    }
    let outcome = pool.shutdown();
    if let Some(t) = ticker {
        t.finish();
    }
    let pool_stats = outcome?;
    tracing::debug!(
        completed = pool_stats.completed,
        caller_runs = pool_stats.caller_runs,
        "merge pool drained"
    );
    Ok(progress.finish())
}

/// Merge every job on the calling thread, in order, stopping at the first failure.
pub fn merge_leaves_sequential(jobs: Vec<LeafMergeJob>, config: &MergeConfig) -> Result<RunStats> {
    config.validate()?;
    let _span = tracing::info_span!("merge_leaves", workers = 0, mode = ?config.mode).entered();
    let progress = Progress::new(jobs.len());
    let ticker = progress.ticker(config)?;
    let result = jobs.iter().try_for_each(|job| {
        let leaf = merge_leaf(job, config.mode, config.delete_inputs)?;
        progress.stats.lock().record(leaf);
        Ok::<_, SplitError>(())
    });
    if let Some(t) = ticker {
        t.finish();
    }
    result?;
    Ok(progress.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use terrane_io::build::{node, way};
    use terrane_io::{EntityContainer, EntitySink, IoError, is_default_order, read_entity_file};

    fn write_leaf(dirs: &LeafDirs, leaf: Path, entities: &[EntityContainer]) {
        let path = dirs.create_leaf_file(leaf, "leaf.trn").unwrap();
        let mut w = create_entity_file(&path).unwrap();
        for e in entities {
            w.write(e).unwrap();
        }
        w.complete().unwrap();
    }

    /// Two datasets over leaves 0b100..=0b111, overlapping on some ids.
    fn datasets(root: &std::path::Path) -> Vec<LeafDirs> {
        let a = LeafDirs::new(root.join("a"));
        let b = LeafDirs::new(root.join("b"));
        for leaf in 0b100..=0b111_u64 {
            let base = leaf as i64 * 100;
            write_leaf(
                &a,
                leaf,
                &[node(base + 1, 0.0, 0.0), node(base + 3, 0.0, 0.0), way(base, &[base + 1])],
            );
            if leaf != 0b110 {
                write_leaf(
                    &b,
                    leaf,
                    &[node(base + 2, 0.0, 0.0), node(base + 3, 0.0, 0.0), way(base + 5, &[])],
                );
            }
        }
        vec![a, b]
    }

    fn quiet(workers: usize) -> MergeConfig {
        MergeConfig::default()
            .with_workers(workers)
            .with_queue_capacity(1)
            .with_progress_interval_ms(0)
    }

    #[test]
    fn plan_covers_every_leaf() {
        let dir = tempfile::tempdir().unwrap();
        let out = LeafDirs::new(dir.path().join("out"));
        let jobs = plan_leaf_merges(&datasets(dir.path()), "leaf.trn", &out).unwrap();
        assert_eq!(jobs.len(), 4);
        assert_eq!(jobs[0].leaf, 0b100);
        assert_eq!(jobs[0].inputs.len(), 2);
        assert_eq!(jobs[2].inputs.len(), 1);
        assert_eq!(jobs[3].output, out.leaf_file(0b111, "leaf.trn"));
    }

    #[test]
    fn plan_rejects_mismatched_trees() {
        let dir = tempfile::tempdir().unwrap();
        let a = LeafDirs::new(dir.path().join("a"));
        let b = LeafDirs::new(dir.path().join("b"));
        write_leaf(&a, 0b101, &[]);
        write_leaf(&b, 0b10110, &[]);
        let out = LeafDirs::new(dir.path().join("out"));
        let err = plan_leaf_merges(&[a, b], "leaf.trn", &out).unwrap_err();
        assert!(matches!(err, SplitError::Precondition(_)));
    }

    #[test]
    fn plan_rejects_unsplit_root_next_to_split_tree() {
        let dir = tempfile::tempdir().unwrap();
        let a = LeafDirs::new(dir.path().join("a"));
        let b = LeafDirs::new(dir.path().join("b"));
        write_leaf(&a, ROOT_PATH, &[]);
        write_leaf(&b, 0b10, &[]);
        write_leaf(&b, 0b11, &[]);
        let out = LeafDirs::new(dir.path().join("out"));
        let err = plan_leaf_merges(&[a, b], "leaf.trn", &out).unwrap_err();
        assert!(matches!(err, SplitError::Precondition(_)), "{err:?}");
        assert!(!out.root().exists());
    }

    #[test]
    fn plan_refuses_stale_output() {
        let dir = tempfile::tempdir().unwrap();
        let data = datasets(dir.path());
        let out = LeafDirs::new(dir.path().join("out"));
        write_leaf(&out, 0b11101, &[node(1, 0.0, 0.0)]);
        let err = plan_leaf_merges(&data, "leaf.trn", &out).unwrap_err();
        assert!(matches!(err, SplitError::Precondition(_)), "{err:?}");
        assert_eq!(out.list_leaves().unwrap(), [0b11101]);
    }

    #[test]
    fn pooled_output_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let data = datasets(dir.path());
        let seq = LeafDirs::new(dir.path().join("seq"));
        let pooled = LeafDirs::new(dir.path().join("pooled"));

        let s1 = merge_leaves_sequential(
            plan_leaf_merges(&data, "leaf.trn", &seq).unwrap(),
            &quiet(1),
        )
        .unwrap();
        let s2 = merge_leaves(
            plan_leaf_merges(&data, "leaf.trn", &pooled).unwrap(),
            &quiet(3),
        )
        .unwrap();
        assert_eq!(s1.leaves_done, 4);
        assert_eq!(s1.entities_written, s2.entities_written);
        assert_eq!(s1.duplicates_dropped, s2.duplicates_dropped);
        assert_eq!(s1.duplicates_dropped, 3);

        for leaf in seq.list_leaves().unwrap() {
            let a = fs::read(seq.leaf_file(leaf, "leaf.trn")).unwrap();
            let b = fs::read(pooled.leaf_file(leaf, "leaf.trn")).unwrap();
            assert_eq!(a, b, "leaf {leaf:x} differs");
            let (_, ents) = read_entity_file(&seq.leaf_file(leaf, "leaf.trn")).unwrap();
            assert!(is_default_order(&ents));
        }
        // Inputs are kept by default.
        assert!(data[0].leaf_file(0b100, "leaf.trn").exists());
    }

    #[test]
    fn corrupt_leaf_fails_the_run_without_output() {
        let dir = tempfile::tempdir().unwrap();
        let data = datasets(dir.path());
        let bad = data[1].leaf_file(0b101, "leaf.trn");
        let bytes = fs::read(&bad).unwrap();
        fs::write(&bad, &bytes[..bytes.len() - 3]).unwrap();

        let out = LeafDirs::new(dir.path().join("out"));
        let jobs = plan_leaf_merges(&data, "leaf.trn", &out).unwrap();
        let err = merge_leaves(jobs, &quiet(2)).unwrap_err();
        assert!(matches!(err, SplitError::Io(IoError::CorruptStream(_))), "{err}");
        let failed = out.leaf_file(0b101, "leaf.trn");
        assert!(!failed.exists());
        let mut tmp = failed.into_os_string();
        tmp.push(".tmp");
        assert!(!PathBuf::from(tmp).exists());
    }

    #[test]
    fn unsorted_mode_and_input_deletion() {
        let dir = tempfile::tempdir().unwrap();
        let data = datasets(dir.path());
        let out = LeafDirs::new(dir.path().join("out"));
        let jobs = plan_leaf_merges(&data, "leaf.trn", &out).unwrap();
        let config = quiet(2)
            .with_mode(MergeMode::Unsorted)
            .with_delete_inputs(true);
        let stats = merge_leaves(jobs, &config).unwrap();
        assert_eq!(stats.duplicates_dropped, 0);
        assert_eq!(stats.entities_written, 4 * 3 + 3 * 3);

        let (_, ents) = read_entity_file(&out.leaf_file(0b100, "leaf.trn")).unwrap();
        let ids: Vec<_> = ents.iter().map(EntityContainer::id).collect();
        assert_eq!(ids, [401, 403, 402, 403, 400, 405]);
        assert!(!data[0].leaf_file(0b100, "leaf.trn").exists());
        assert!(!data[1].leaf_file(0b111, "leaf.trn").exists());
    }
}
