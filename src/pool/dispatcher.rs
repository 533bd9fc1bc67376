use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::worker::{Slot, Worker};
use super::{Counters, DispatchError, DispatchStats, Job, JobProcessor, PoolConfig, cancelled};

/// Owns the submission queue and the worker pool.
///
/// Starting is the constructor, so a dispatcher cannot be started twice.
/// Flipping the cancellation signal to `true` stops the matching loop: idle
/// workers exit, busy workers finish their current job first, and jobs still
/// queued are counted as abandoned. [`Dispatcher::shutdown`] is the graceful
/// alternative that drains the queue.
pub struct Dispatcher {
    jobs: mpsc::Sender<Job>,
    counters: Arc<Counters>,
    matcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn `config.workers` workers and the matching loop on the current runtime.
    pub fn start(
        config: PoolConfig,
        processor: Arc<dyn JobProcessor>,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        let workers = config.workers.max(1);
        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (ready_tx, ready_rx) = mpsc::channel(workers);
        let counters = Arc::new(Counters::default());

        let handles: Vec<_> = (1..=workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    ready: ready_tx.clone(),
                    processor: processor.clone(),
                    cancel: cancel.clone(),
                    counters: counters.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        drop(ready_tx);

        let matcher = tokio::spawn(run_matcher(jobs_rx, ready_rx, cancel, counters.clone()));

        info!(
            workers,
            queue_capacity = config.queue_capacity,
            "dispatcher started"
        );

        Self {
            jobs: jobs_tx,
            counters,
            matcher,
            workers: handles,
        }
    }

    /// Queue a job, waiting while the queue is full.
    pub async fn submit(&self, job: Job) -> Result<(), DispatchError> {
        submit(&self.jobs, &self.counters, job).await
    }

    /// A cloneable handle for submitting from other tasks.
    ///
    /// The queue only closes once the dispatcher and every submitter are
    /// dropped, so drop submitters before calling [`Dispatcher::shutdown`].
    pub fn submitter(&self) -> Submitter {
        Submitter {
            jobs: self.jobs.clone(),
            counters: self.counters.clone(),
        }
    }

    pub fn stats(&self) -> DispatchStats {
        self.counters.snapshot()
    }

    /// Close the queue, let every queued job run, and wait for the workers.
    pub async fn shutdown(self) -> DispatchStats {
        let Dispatcher {
            jobs,
            counters,
            matcher,
            workers,
        } = self;
        drop(jobs);

        if let Err(e) = matcher.await {
            error!(error = %e, "matching loop panicked");
        }
        for handle in workers {
            if let Err(e) = handle.await {
                error!(error = %e, "worker panicked");
            }
        }

        let stats = counters.snapshot();
        info!(
            submitted = stats.submitted,
            succeeded = stats.succeeded,
            failed = stats.failed,
            discarded = stats.discarded,
            abandoned = stats.abandoned,
            "dispatcher stopped"
        );
        stats
    }
}

/// Submission handle detached from the [`Dispatcher`].
#[derive(Clone)]
pub struct Submitter {
    jobs: mpsc::Sender<Job>,
    counters: Arc<Counters>,
}

impl Submitter {
    pub async fn submit(&self, job: Job) -> Result<(), DispatchError> {
        submit(&self.jobs, &self.counters, job).await
    }
}

async fn submit(
    jobs: &mpsc::Sender<Job>,
    counters: &Counters,
    job: Job,
) -> Result<(), DispatchError> {
    jobs.send(job)
        .await
        .map_err(|rejected| DispatchError::Closed(rejected.0))?;
    counters.submitted();
    Ok(())
}

/// Pair each queued job with the next idle worker, in queue order.
async fn run_matcher(
    mut jobs: mpsc::Receiver<Job>,
    mut ready: mpsc::Receiver<Slot>,
    mut cancel: watch::Receiver<bool>,
    counters: Arc<Counters>,
) {
    'jobs: loop {
        let mut job = tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => break 'jobs,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break 'jobs,
            },
        };

        loop {
            let slot = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => {
                    abandon(&counters, &job);
                    break 'jobs;
                }
                slot = ready.recv() => slot,
            };

            let Some(slot) = slot else {
                warn!("no workers left to take jobs");
                abandon(&counters, &job);
                break 'jobs;
            };

            // A worker that was cancelled while idle leaves a dead slot behind.
            match slot.send(job) {
                Ok(()) => {
                    counters.dispatched();
                    continue 'jobs;
                }
                Err(returned) => job = returned,
            }
        }
    }

    jobs.close();
    while let Ok(job) = jobs.try_recv() {
        abandon(&counters, &job);
    }
    debug!("matching loop stopped");
}

fn abandon(counters: &Counters, job: &Job) {
    counters.abandoned();
    warn!(%job, "job abandoned by cancellation");
}
