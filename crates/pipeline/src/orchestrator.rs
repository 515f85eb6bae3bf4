//! One processing cycle: receive → resolve → (transport → load → cleanup)* → acknowledge.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use ferry_core::{Job, ObjectLocator};
use ferry_queue::Delivery;

use crate::error::{PipelineError, Result};
use crate::seams::{MessageSource, ObjectCopier, Router, WarehouseLoader};

/// How a cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// The queue was empty.
    NoMessage,
    /// Every job loaded and the message was acknowledged. `loaded` may be 0
    /// for a message that matched no rule.
    Success { message_id: String, loaded: usize },
    /// Some jobs loaded before the failure; the message was not acknowledged.
    PartialFailure(PipelineError),
    /// Nothing was loaded; the message, if any, was left for redelivery.
    Aborted(PipelineError),
}

/// A failed job run, with how many jobs of the batch had already loaded.
struct BatchFailure {
    loaded: usize,
    error: PipelineError,
}

pub struct Orchestrator {
    source: Arc<dyn MessageSource>,
    router: Arc<dyn Router>,
    copier: Arc<dyn ObjectCopier>,
    loader: Arc<dyn WarehouseLoader>,
}

impl Orchestrator {
    pub fn new(
        source: Arc<dyn MessageSource>,
        router: Arc<dyn Router>,
        copier: Arc<dyn ObjectCopier>,
        loader: Arc<dyn WarehouseLoader>,
    ) -> Self {
        Self {
            source,
            router,
            copier,
            loader,
        }
    }

    pub async fn set_queue_name(&self, queue_name: &str) {
        self.source.set_queue_name(queue_name).await;
    }

    /// Run one cycle to completion.
    ///
    /// Cancellation is only observed while waiting on the queue and during
    /// acknowledge retries; transport and load run to the end.
    pub async fn run_one_cycle(&self, cancel: &CancellationToken) -> CycleOutcome {
        let delivery = match self.source.receive(cancel).await {
            Ok(delivery) => delivery,
            Err(e) if e.is_no_message() => return CycleOutcome::NoMessage,
            Err(e) => {
                let err = PipelineError::from(e);
                if !err.is_cancelled() {
                    error!(error = %err, "Can't receive message");
                }
                return CycleOutcome::Aborted(err);
            }
        };
        // The receipt is abandoned on drop unless acknowledged below.
        let Delivery { locators, receipt } = delivery;
        let message_id = receipt.message_id().to_string();

        let locators = match locators {
            Ok(locators) => locators,
            Err(source) => {
                return CycleOutcome::Aborted(PipelineError::Parse { message_id, source });
            }
        };

        let jobs = self.route(&message_id, &locators);
        let loaded = match self.run_jobs(&message_id, &jobs).await {
            Ok(loaded) => loaded,
            Err(BatchFailure { loaded: 0, error }) => return CycleOutcome::Aborted(error),
            Err(BatchFailure { error, .. }) => return CycleOutcome::PartialFailure(error),
        };

        if let Err(e) = receipt.acknowledge(cancel).await {
            error!(message_id = %message_id, error = %e, "Can't acknowledge message");
            let err = PipelineError::Acknowledge(e);
            return if loaded == 0 {
                CycleOutcome::Aborted(err)
            } else {
                CycleOutcome::PartialFailure(err)
            };
        }
        info!(message_id = %message_id, loaded, "Processed message");
        CycleOutcome::Success { message_id, loaded }
    }

    /// Import locators that did not come from the queue. Returns the number
    /// of jobs loaded.
    pub async fn process_locators(&self, label: &str, locators: &[ObjectLocator]) -> Result<usize> {
        let jobs = self.route(label, locators);
        self.run_jobs(label, &jobs).await.map_err(|f| f.error)
    }

    /// Resolve locator by locator so unmatched ones can be reported.
    fn route(&self, message_id: &str, locators: &[ObjectLocator]) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(locators.len());
        for locator in locators {
            let matched = self.router.resolve(std::slice::from_ref(locator));
            if matched.is_empty() {
                warn!(message_id = %message_id, source = %locator, "no match rules");
            }
            jobs.extend(matched);
        }
        jobs
    }

    /// Jobs run in order; the first failure stops the batch.
    async fn run_jobs(&self, message_id: &str, jobs: &[Job]) -> std::result::Result<usize, BatchFailure> {
        for (loaded, job) in jobs.iter().enumerate() {
            info!(message_id = %message_id, job = %job, "Start job");
            if let Err(error) = self.run_job(message_id, job).await {
                error!(message_id = %message_id, source = %job.source, error = %error, "Job failed");
                return Err(BatchFailure { loaded, error });
            }
        }
        Ok(jobs.len())
    }

    /// Transport, load, then clean up the staged copy whatever the load did.
    async fn run_job(&self, message_id: &str, job: &Job) -> Result<()> {
        let staged = self
            .copier
            .transport(job)
            .await
            .map_err(|source| PipelineError::Transport {
                locator: job.source.to_string(),
                source,
            })?;

        let loaded = self
            .loader
            .load(job)
            .await
            .map_err(|source| PipelineError::Load {
                destination: job.destination.to_string(),
                source,
            });

        let staging = staged.locator().to_string();
        if let Err(source) = staged.cleanup().await {
            let err = PipelineError::Cleanup {
                locator: staging,
                source,
            };
            warn!(message_id = %message_id, source = %job.source, error = %err, "Can't clean up staged object");
        }
        loaded
    }
}
