use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info};

use super::{Counters, Job, JobKind, JobProcessor, cancelled};

/// A worker's half of the readiness handshake: the matcher sends one job into it.
pub(super) type Slot = oneshot::Sender<Job>;

pub(super) struct Worker {
    pub(super) id: usize,
    pub(super) ready: mpsc::Sender<Slot>,
    pub(super) processor: Arc<dyn JobProcessor>,
    pub(super) cancel: watch::Receiver<bool>,
    pub(super) counters: Arc<Counters>,
}

impl Worker {
    /// Register readiness, wait for a job or cancellation, run the job, repeat.
    ///
    /// Exits when cancelled while idle, or when the matcher is gone. A job
    /// already received is always run to completion.
    pub(super) async fn run(mut self) {
        loop {
            let (slot, inbox) = oneshot::channel();
            if self.ready.send(slot).await.is_err() {
                break;
            }

            let job = tokio::select! {
                biased;
                job = inbox => match job {
                    Ok(job) => job,
                    Err(_) => break,
                },
                _ = cancelled(&mut self.cancel) => break,
            };

            self.process(job).await;
        }
        debug!(worker = self.id, "worker stopped");
    }

    async fn process(&self, job: Job) {
        let Some(kind) = job.job_kind() else {
            error!(worker = self.id, kind = %job.kind, "discarding job with unknown kind");
            self.counters.discarded();
            return;
        };

        let result = match kind {
            JobKind::Credit => {
                self.processor
                    .credit(job.to_account, job.amount_cents)
                    .await
            }
            JobKind::Debit => {
                self.processor
                    .debit(job.from_account, job.amount_cents)
                    .await
            }
            JobKind::Transfer => {
                self.processor
                    .transfer(job.from_account, job.to_account, job.amount_cents)
                    .await
            }
        };

        match result {
            Ok(transaction) => {
                self.counters.succeeded();
                info!(
                    worker = self.id,
                    transaction_id = transaction.id,
                    %job,
                    "job processed"
                );
            }
            Err(e) => {
                self.counters.failed();
                error!(worker = self.id, %job, error = %e, "job failed");
            }
        }
    }
}
