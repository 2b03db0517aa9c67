// Copyright 2025 the Terrane Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A cancellable periodic callback, used for progress reporting.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::stop::{StopToken, Stoppable};

/// Runs a callback on its own thread once per interval until stopped.
///
/// Stopping wakes the ticker immediately; it never sleeps out a full interval after
/// [`Ticker::stop`]. Dropping a ticker stops and joins it.
#[derive(Debug)]
pub struct Ticker {
    stop: StopToken,
    handle: Option<JoinHandle<u64>>,
}

impl Ticker {
    /// Start calling `tick` every `interval`.
    ///
    /// The callback receives the tick number, starting at 1.
    pub fn start<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let stop = StopToken::new();
        let token = stop.clone();
        let handle = thread::Builder::new()
            .name(format!("{name}-ticker"))
            .spawn(move || {
                let mut n = 0;
                while !token.wait_timeout(interval) {
                    n += 1;
                    tick(n);
                }
                n
            })?;
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the ticker and wait for its thread. Returns the number of ticks delivered.
    pub fn finish(mut self) -> u64 {
        self.stop.stop();
        self.handle
            .take()
            .and_then(|h| h.join().ok())
            .unwrap_or(0)
    }
}

impl Stoppable for Ticker {
    fn stop(&self) {
        self.stop.stop();
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.stop.stop();
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}
