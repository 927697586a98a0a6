//! Job queue, worker, and delivery protection.
//!
//! Jobs travel as JSON payloads through a Redis list; progress fans out on
//! a pub/sub channel and results land under a TTL'd key so callers can poll
//! after the fact. [`CircuitBreaker`] guards the enqueue path and the
//! dispatcher falls back to inline processing while the queue is down, so a
//! broken broker degrades throughput instead of dropping uploads.

mod breaker;
mod dispatch;
mod memory;
mod redis;
mod worker;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{ProcessingJob, ProcessingProgress};

pub use breaker::{Circuit, CircuitBreaker};
pub use dispatch::{DispatchError, InlineDispatcher, JobDispatcher, QueueDispatcher};
pub use memory::InMemoryQueue;
pub use redis::RedisQueue;
pub use worker::Worker;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue connection failed: {0}")]
    Connection(String),

    #[error("queue backend error: {0}")]
    Backend(String),

    #[error("job payload invalid: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Acknowledgement returned to the caller at dispatch time.
///
/// `enqueued` is false when the job ran (or is running) inline because the
/// queue was unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueReceipt {
    pub job_id: String,
    pub enqueued: bool,
}

/// Terminal record for a job, kept for a bounded time after completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResult {
    pub job_id: String,
    pub success: bool,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Transport for processing jobs and their side channels.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Push a job onto the work queue.
    async fn enqueue(&self, job: &ProcessingJob) -> Result<(), QueueError>;

    /// Pop the oldest job, waiting up to `timeout`. Returns `None` on
    /// timeout so callers can observe shutdown between polls.
    async fn pop(&self, timeout: Duration) -> Result<Option<ProcessingJob>, QueueError>;

    /// Park a job that exhausted its attempts or cannot be parsed.
    async fn dead_letter(&self, job: &ProcessingJob) -> Result<(), QueueError>;

    /// Number of jobs currently waiting.
    async fn depth(&self) -> Result<u64, QueueError>;

    /// Record the terminal result for a job.
    async fn store_result(&self, job_id: &str, result: &JobResult) -> Result<(), QueueError>;

    /// Fetch a previously stored result, if it has not expired.
    async fn fetch_result(&self, job_id: &str) -> Result<Option<JobResult>, QueueError>;

    /// Broadcast a progress snapshot for a document.
    async fn publish_progress(
        &self,
        document_id: &str,
        progress: &ProcessingProgress,
    ) -> Result<(), QueueError>;
}
