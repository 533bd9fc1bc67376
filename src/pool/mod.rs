//! Fixed-size worker pool fed by a bounded job queue.
//!
//! A [`Dispatcher`] owns the submission queue and a readiness queue with one
//! slot per worker. Its matching task pairs each queued [`Job`] with the next
//! idle worker and hands it over; workers run jobs through a [`JobProcessor`].

mod dispatcher;
mod job;
mod processor;
mod worker;

pub use dispatcher::{Dispatcher, Submitter};
pub use job::{Job, JobKind};
pub use processor::JobProcessor;

use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;

/// Capacity of the submission queue. Submitting to a full queue waits.
pub const QUEUE_CAPACITY: usize = 100;

/// Number of workers when none is configured.
pub const DEFAULT_WORKERS: usize = 5;

#[derive(Error, Debug)]
pub enum DispatchError {
    /// The dispatcher no longer accepts work. The rejected job is handed back.
    #[error("dispatcher is closed, job was not queued: {0}")]
    Closed(Job),
}

impl DispatchError {
    pub fn into_job(self) -> Job {
        match self {
            DispatchError::Closed(job) => job,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: QUEUE_CAPACITY,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            ..Self::default()
        }
    }
}

/// Point-in-time copy of the dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Jobs accepted into the queue
    pub submitted: u64,
    /// Jobs handed to a worker
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Jobs dropped for an unknown kind
    pub discarded: u64,
    /// Queued jobs left behind by cancellation
    pub abandoned: u64,
}

impl DispatchStats {
    /// Jobs that reached a terminal outcome.
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed + self.discarded + self.abandoned
    }
}

#[derive(Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    discarded: AtomicU64,
    abandoned: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn submitted(&self) {
        Self::bump(&self.submitted);
    }

    pub(crate) fn dispatched(&self) {
        Self::bump(&self.dispatched);
    }

    pub(crate) fn succeeded(&self) {
        Self::bump(&self.succeeded);
    }

    pub(crate) fn failed(&self) {
        Self::bump(&self.failed);
    }

    pub(crate) fn discarded(&self) {
        Self::bump(&self.discarded);
    }

    pub(crate) fn abandoned(&self) {
        Self::bump(&self.abandoned);
    }

    pub(crate) fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Resolves once `cancel` reads `true`. A dropped sender never cancels.
pub(crate) async fn cancelled(cancel: &mut tokio::sync::watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
