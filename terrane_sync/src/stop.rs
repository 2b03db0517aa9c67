// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Something that can be asked to halt.
///
/// Groups call [`Stoppable::stop`] on every registered member when a task fails.
pub trait Stoppable: Send + Sync {
    /// Request a halt. Must be idempotent and must not block.
    fn stop(&self);
}

#[derive(Debug, Default)]
struct Inner {
    stopped: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// A shared stop flag that sleepers can wait on.
///
/// Clones share the flag. Once stopped, a token stays stopped.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    inner: Arc<Inner>,
}

impl StopToken {
    /// A fresh, running token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiter.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::Release);
        let _guard = self.inner.lock.lock();
        self.inner.wake.notify_all();
    }

    /// Whether the flag is set.
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Sleep for up to `timeout`, returning early if stopped.
    ///
    /// Returns whether the token is stopped.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut guard = self.inner.lock.lock();
        loop {
            if self.is_stopped() {
                return true;
            }
            if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                return self.is_stopped();
            }
        }
    }
}

impl Stoppable for StopToken {
    fn stop(&self) {
        Self::stop(self);
    }
}
