// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fail-fast groups of cooperating threads.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

use crate::error::{FirstError, SyncError, panic_message};
use crate::stop::{StopToken, Stoppable};

type Task<'env, E> = Box<dyn FnOnce(&StopToken) -> Result<(), SyncError<E>> + Send + 'env>;

/// A fixed set of tasks run on scoped threads, failing as a unit.
///
/// Tasks are added with [`TaskGroup::spawn`] and all started by [`TaskGroup::join`]. When any
/// task returns an error or panics, the group's [`StopToken`] is set and every registered
/// [`Stoppable`] is stopped; siblings are expected to notice and return (typically with
/// [`SyncError::Stopped`], or [`SyncError::Disconnected`] from a buffer whose peer exited).
/// `join` waits for every task and then reports the originating error, never one of those
/// follow-on errors while an originating one exists.
///
/// Tasks may borrow from the caller's stack, like [`std::thread::scope`].
pub struct TaskGroup<'env, E> {
    name: String,
    tasks: Vec<(String, Task<'env, E>)>,
    stop: StopToken,
    stoppables: Vec<Arc<dyn Stoppable + 'env>>,
}

impl<E> fmt::Debug for TaskGroup<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGroup")
            .field("name", &self.name)
            .field("tasks", &self.tasks.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .field("stoppables", &self.stoppables.len())
            .field("stop", &self.stop)
            .finish()
    }
}

impl<'env, E: Send> TaskGroup<'env, E> {
    /// An empty group. `name` prefixes thread names and log records.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: Vec::new(),
            stop: StopToken::new(),
            stoppables: Vec::new(),
        }
    }

    /// The token set when the group fails.
    pub fn stop_token(&self) -> StopToken {
        self.stop.clone()
    }

    /// Stop `s` too when the group fails.
    pub fn register(&mut self, s: Arc<dyn Stoppable + 'env>) {
        self.stoppables.push(s);
    }

    /// Add a task. It receives the group's stop token.
    pub fn spawn<F>(&mut self, name: &str, task: F)
    where
        F: FnOnce(&StopToken) -> Result<(), SyncError<E>> + Send + 'env,
    {
        self.tasks.push((name.to_owned(), Box::new(task)));
    }

    /// Run every task to completion and report the first originating error.
    pub fn join(self) -> Result<(), SyncError<E>> {
        let Self {
            name,
            tasks,
            stop,
            stoppables,
        } = self;
        let first = FirstError::new();
        let fail = |task: &str, err: SyncError<E>| {
            if !err.is_secondary() {
                tracing::warn!(group = %name, task, error = %DisplayKind(&err), "task failed");
            }
            first.record(err);
            stop.stop();
            for s in &stoppables {
                s.stop();
            }
        };

        thread::scope(|scope| {
            for (task_name, task) in tasks {
                let token = stop.clone();
                let fail = &fail;
                let spawned = thread::Builder::new()
                    .name(format!("{name}-{task_name}"))
                    .spawn_scoped(scope, move || {
                        let result = panic::catch_unwind(AssertUnwindSafe(|| task(&token)));
                        match result {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => fail(&task_name, e),
                            Err(p) => fail(&task_name, SyncError::Panicked(panic_message(&*p))),
                        }
                    });
                if let Err(e) = spawned {
                    fail("spawn", SyncError::Spawn(e));
                }
            }
        });

        match first.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Displays the kind of a `SyncError` without requiring `E: Display`.
struct DisplayKind<'a, E>(&'a SyncError<E>);

impl<E> fmt::Display for DisplayKind<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            SyncError::Task(_) => f.write_str("task error"),
            SyncError::Panicked(msg) => write!(f, "panic: {msg}"),
            SyncError::Spawn(e) => write!(f, "spawn: {e}"),
            SyncError::Stopped => f.write_str("stopped"),
            SyncError::Disconnected => f.write_str("disconnected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::bounded_buffer;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn all_tasks_succeed() {
        let hits = AtomicUsize::new(0);
        let mut group = TaskGroup::<String>::new("ok");
        for i in 0..4 {
            let hits = &hits;
            group.spawn(&format!("t{i}"), move |_| {
                hits.fetch_add(1, Ordering::Relaxed);
                Ok(())
            });
        }
        group.join().unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn failure_stops_siblings_and_is_reported() {
        struct Flag(AtomicBool);
        impl Stoppable for Flag {
            fn stop(&self) {
                self.0.store(true, Ordering::Release);
            }
        }

        let flag = Arc::new(Flag(AtomicBool::new(false)));
        let mut group = TaskGroup::<&'static str>::new("failing");
        group.register(flag.clone());
        group.spawn("spinner", |stop| {
            while !stop.wait_timeout(Duration::from_millis(5)) {}
            Err(SyncError::Stopped)
        });
        group.spawn("bad", |_| Err(SyncError::Task("boom")));
        let err = group.join().unwrap_err();
        assert!(matches!(err, SyncError::Task("boom")));
        assert!(flag.0.load(Ordering::Acquire));
    }

    #[test]
    fn producer_failure_wins_over_consumer_disconnect() {
        let (tx, mut rx) = bounded_buffer::<u32>(1);
        let mut group = TaskGroup::<&'static str>::new("bridge");
        group.spawn("producer", move |_| {
            tx.put(1)?;
            Err(SyncError::Task("decode error"))
        });
        group.spawn("consumer", move |_| {
            while rx.recv()?.is_some() {}
            Ok(())
        });
        let err = group.join().unwrap_err();
        assert!(matches!(err, SyncError::Task("decode error")), "{err:?}");
    }

    #[test]
    fn consumer_failure_unblocks_producer() {
        let (tx, mut rx) = bounded_buffer::<u32>(1);
        let mut group = TaskGroup::<&'static str>::new("bridge");
        group.spawn("producer", move |_| {
            for i in 0.. {
                tx.put(i)?;
            }
            Ok(())
        });
        group.spawn("consumer", move |_| {
            rx.recv()?;
            Err(SyncError::Task("rejected"))
        });
        let err = group.join().unwrap_err();
        assert!(matches!(err, SyncError::Task("rejected")), "{err:?}");
    }

    #[test]
    fn panic_is_captured() {
        let mut group = TaskGroup::<()>::new("panicky");
        group.spawn("p", |_| panic!("exploded"));
        let err = group.join().unwrap_err();
        assert!(matches!(err, SyncError::Panicked(ref m) if m == "exploded"));
    }
}
