//! Hands jobs to the queue, or runs them inline when it is unavailable.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, info};

use crate::models::ProcessingJob;
use crate::pipeline::ProcessingOrchestrator;
use crate::utils::mime;

use super::{CircuitBreaker, EnqueueReceipt, JobQueue, QueueError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Accepts a job for processing and acknowledges how it was taken.
#[async_trait]
pub trait JobDispatcher: Send + Sync {
    async fn dispatch(&self, job: ProcessingJob) -> Result<EnqueueReceipt, DispatchError>;
}

/// Queue-first dispatcher. Enqueue failures trip the breaker and the job
/// runs inline instead, so uploads keep processing while the broker is down.
pub struct QueueDispatcher {
    queue: Arc<dyn JobQueue>,
    breaker: Arc<CircuitBreaker>,
    orchestrator: Arc<ProcessingOrchestrator>,
}

impl QueueDispatcher {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        breaker: Arc<CircuitBreaker>,
        orchestrator: Arc<ProcessingOrchestrator>,
    ) -> Self {
        Self {
            queue,
            breaker,
            orchestrator,
        }
    }

    fn run_inline(&self, job: ProcessingJob) -> EnqueueReceipt {
        spawn_inline(&self.orchestrator, job)
    }
}

#[async_trait]
impl JobDispatcher for QueueDispatcher {
    async fn dispatch(&self, job: ProcessingJob) -> Result<EnqueueReceipt, DispatchError> {
        if !mime::is_supported_mime(&job.file.mime_type) {
            return Err(DispatchError::UnsupportedMime(job.file.mime_type));
        }
        let queued = job.clone();
        let receipt: Result<EnqueueReceipt, QueueError> = self
            .breaker
            .exec(
                || async move {
                    self.queue.enqueue(&queued).await?;
                    Ok(EnqueueReceipt {
                        job_id: queued.job_id.clone(),
                        enqueued: true,
                    })
                },
                || async move { Ok(self.run_inline(job)) },
            )
            .await;
        let receipt = receipt?;
        info!(job = %receipt.job_id, enqueued = receipt.enqueued, "job dispatched");
        Ok(receipt)
    }
}

/// Dispatcher for deployments without a broker; every job runs in-process.
pub struct InlineDispatcher {
    orchestrator: Arc<ProcessingOrchestrator>,
}

impl InlineDispatcher {
    pub fn new(orchestrator: Arc<ProcessingOrchestrator>) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl JobDispatcher for InlineDispatcher {
    async fn dispatch(&self, job: ProcessingJob) -> Result<EnqueueReceipt, DispatchError> {
        if !mime::is_supported_mime(&job.file.mime_type) {
            return Err(DispatchError::UnsupportedMime(job.file.mime_type));
        }
        Ok(spawn_inline(&self.orchestrator, job))
    }
}

fn spawn_inline(orchestrator: &Arc<ProcessingOrchestrator>, job: ProcessingJob) -> EnqueueReceipt {
    let receipt = EnqueueReceipt {
        job_id: job.job_id.clone(),
        enqueued: false,
    };
    let orchestrator = Arc::clone(orchestrator);
    tokio::spawn(async move {
        if let Err(e) = orchestrator.process_document(&job).await {
            error!(job = %job.job_id, error = %e, "inline processing failed");
        }
    });
    receipt
}
