// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fixed-size worker pool with a bounded queue and caller-runs backpressure.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError, bounded};

use crate::error::{FirstError, SyncError, panic_message};
use crate::stop::StopToken;

type Job<E> = Box<dyn FnOnce() -> Result<(), E> + Send + 'static>;

/// Counters reported by [`WorkerPool::shutdown`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Jobs that ran to success.
    pub completed: u64,
    /// Jobs that ran on the submitting thread because the queue was full.
    pub caller_runs: u64,
    /// Jobs dropped unrun because the pool had already failed.
    pub skipped: u64,
}

struct Shared<E> {
    stop: StopToken,
    first: FirstError<E>,
    completed: AtomicU64,
    caller_runs: AtomicU64,
    skipped: AtomicU64,
}

impl<E> Shared<E> {
    fn run(&self, job: Job<E>) {
        if self.stop.is_stopped() {
            self.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(Ok(())) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(Err(e)) => self.fail(SyncError::Task(e)),
            Err(p) => self.fail(SyncError::Panicked(panic_message(&*p))),
        }
    }

    fn fail(&self, err: SyncError<E>) {
        if self.first.record(err) {
            tracing::warn!("worker pool job failed, aborting remaining jobs");
        }
        self.stop.stop();
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            completed: self.completed.load(Ordering::Relaxed),
            caller_runs: self.caller_runs.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// A bounded pool of worker threads.
///
/// - [`WorkerPool::submit`] queues a job. When the queue is full the job runs on the submitting
///   thread instead, which throttles the submitter to the pool's pace. Nothing is dropped.
/// - The first job error (or panic) aborts the pool: its stop token is set, jobs still queued
///   are skipped, and further submissions fail with [`SyncError::Stopped`].
/// - [`WorkerPool::shutdown`] waits for every queued and in-flight job, then reports the first
///   error or the run's [`PoolStats`].
pub struct WorkerPool<E> {
    tx: Option<Sender<Job<E>>>,
    workers: Vec<JoinHandle<()>>,
    shared: Arc<Shared<E>>,
}

impl<E> fmt::Debug for WorkerPool<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("queued", &self.tx.as_ref().map_or(0, Sender::len))
            .field("stats", &self.shared.stats())
            .finish_non_exhaustive()
    }
}

impl<E: Send + 'static> WorkerPool<E> {
    /// Start `workers` threads (at least one) sharing a queue of `queue_capacity` jobs.
    pub fn new(name: &str, workers: usize, queue_capacity: usize) -> Result<Self, SyncError<E>> {
        let (tx, rx) = bounded::<Job<E>>(queue_capacity);
        let shared = Arc::new(Shared {
            stop: StopToken::new(),
            first: FirstError::new(),
            completed: AtomicU64::new(0),
            caller_runs: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });
        let mut pool = Self {
            tx: Some(tx),
            workers: Vec::with_capacity(workers.max(1)),
            shared,
        };
        for i in 0..workers.max(1) {
            let rx = rx.clone();
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || {
                    for job in rx.iter() {
                        shared.run(job);
                    }
                })
                .map_err(SyncError::Spawn)?;
            pool.workers.push(handle);
        }
        tracing::debug!(pool = name, workers = pool.workers.len(), queue_capacity, "started pool");
        Ok(pool)
    }

    /// Submit a job, running it on this thread if the queue is full.
    ///
    /// Fails with [`SyncError::Stopped`] once the pool has aborted; the originating error is
    /// reported by [`WorkerPool::shutdown`].
    pub fn submit<F>(&self, job: F) -> Result<(), SyncError<E>>
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
    {
        if self.shared.stop.is_stopped() {
            return Err(SyncError::Stopped);
        }
        let Some(tx) = &self.tx else {
            return Err(SyncError::Stopped);
        };
        match tx.try_send(Box::new(job)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job) | TrySendError::Disconnected(job)) => {
                self.shared.caller_runs.fetch_add(1, Ordering::Relaxed);
                self.shared.run(job);
                if self.shared.stop.is_stopped() {
                    Err(SyncError::Stopped)
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Token set when the pool aborts. Long jobs may poll it.
    pub fn stop_token(&self) -> StopToken {
        self.shared.stop.clone()
    }

    /// Whether a job has failed.
    pub fn is_aborted(&self) -> bool {
        self.shared.first.is_set()
    }

    /// Counters so far.
    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Wait for every submitted job, then report the first error or the run's counters.
    pub fn shutdown(mut self) -> Result<PoolStats, SyncError<E>> {
        self.join_workers();
        match self.shared.first.take() {
            Some(err) => Err(err),
            None => Ok(self.shared.stats()),
        }
    }

    fn join_workers(&mut self) {
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                self.shared
                    .fail(SyncError::Panicked("worker thread panicked".to_owned()));
            }
        }
    }
}

impl<E> Drop for WorkerPool<E> {
    fn drop(&mut self) {
        drop(self.tx.take());
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    #[test]
    fn runs_every_job() {
        let pool = WorkerPool::<String>::new("t", 3, 4).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..100 {
            let hits = Arc::clone(&hits);
            pool.submit(move || {
                hits.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })
            .unwrap();
        }
        let stats = pool.shutdown().unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 100);
        assert_eq!(stats.completed, 100);
        assert_eq!(stats.skipped, 0);
    }

    #[test]
    fn full_queue_runs_on_caller() {
        let pool = WorkerPool::<String>::new("t", 1, 1).unwrap();
        let (started_tx, started_rx) = bounded(1);
        let (release_tx, release_rx) = bounded::<()>(1);

        // Occupy the only worker.
        pool.submit(move || {
            started_tx.send(()).map_err(|e| e.to_string())?;
            release_rx.recv().map_err(|e| e.to_string())?;
            Ok(())
        })
        .unwrap();
        started_rx.recv().unwrap();

        // Fill the queue.
        pool.submit(|| Ok(())).unwrap();

        // No room: runs right here.
        let me = thread::current().id();
        let ran_on = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&ran_on);
        pool.submit(move || {
            *slot.lock() = Some(thread::current().id());
            Ok(())
        })
        .unwrap();
        assert_eq!(*ran_on.lock(), Some(me));

        release_tx.send(()).unwrap();
        let stats = pool.shutdown().unwrap();
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.caller_runs, 1);
    }

    #[test]
    fn first_error_aborts_the_pool() {
        let pool = WorkerPool::<&'static str>::new("t", 2, 8).unwrap();
        pool.submit(|| Err("leaf 7 failed")).unwrap();

        let deadline = Instant::now() + Duration::from_secs(30);
        while !pool.is_aborted() {
            assert!(Instant::now() < deadline, "pool never aborted");
            thread::sleep(Duration::from_millis(1));
        }
        assert!(matches!(pool.submit(|| Ok(())), Err(SyncError::Stopped)));
        assert!(pool.stop_token().is_stopped());

        let err = pool.shutdown().unwrap_err();
        assert!(matches!(err, SyncError::Task("leaf 7 failed")));
    }

    #[test]
    fn panicking_job_is_reported() {
        let pool = WorkerPool::<()>::new("t", 1, 0).unwrap();
        let _ = pool.submit(|| panic!("bad leaf"));
        let err = pool.shutdown().unwrap_err();
        assert!(matches!(err, SyncError::Panicked(ref m) if m == "bad leaf"));
    }
}
