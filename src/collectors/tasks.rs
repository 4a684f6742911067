//! Detached background work for asynchronous collectors.
//!
//! Tasks are tracked with tokio-util's `TaskTracker` so shutdown can give them
//! a bounded chance to finish and close their sessions. A panicking task is
//! caught and logged here; nothing is ever propagated to the spawner.

use crate::collectors::executor::panic_message;
use futures::FutureExt as _;
use prometheus::IntGauge;
use std::{future::Future, panic::AssertUnwindSafe, time::Duration};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
    in_flight: IntGauge,
}

impl BackgroundTasks {
    /// `in_flight` mirrors the number of running tasks.
    pub fn new(in_flight: IntGauge) -> Self {
        Self {
            tracker: TaskTracker::new(),
            in_flight,
        }
    }

    /// Spawn a detached task; its panics are logged, never propagated.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let in_flight = self.in_flight.clone();
        in_flight.inc();
        debug!(collector = name, "spawning background collector");

        let _ = self.tracker.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                error!(
                    collector = name,
                    panic = panic_message(panic.as_ref()),
                    "background collector panicked"
                );
            }
            in_flight.dec();
        });
    }

    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Close the tracker and wait up to `grace` for running tasks.
    /// Returns `true` if every task finished in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();

        if self.tracker.is_empty() {
            return true;
        }

        info!(
            tasks = self.tracker.len(),
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "waiting for background collectors"
        );

        if tokio::time::timeout(grace, self.tracker.wait()).await.is_ok() {
            true
        } else {
            warn!(
                tasks = self.tracker.len(),
                "background collectors still running, abandoning them"
            );
            false
        }
    }
}
