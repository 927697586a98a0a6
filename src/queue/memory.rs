//! In-process queue backend.
//!
//! Mirrors the Redis backend's semantics (FIFO delivery, bounded pop wait,
//! dead-letter parking, result storage) without a broker, for single-process
//! deployments and tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::warn;

use crate::models::{ProcessingJob, ProcessingProgress};

use super::{JobQueue, JobResult, QueueError};

#[derive(Default)]
pub struct InMemoryQueue {
    jobs: Mutex<VecDeque<String>>,
    dead: Mutex<Vec<String>>,
    results: Mutex<HashMap<String, JobResult>>,
    published: Mutex<Vec<(String, ProcessingProgress)>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs parked on the dead-letter list.
    pub fn dead_jobs(&self) -> Vec<ProcessingJob> {
        self.dead
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|payload| ProcessingJob::from_payload(payload).ok())
            .collect()
    }

    /// Progress snapshots published for a document, oldest first.
    pub fn published_progress(&self, document_id: &str) -> Vec<ProcessingProgress> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(id, _)| id == document_id)
            .map(|(_, progress)| progress.clone())
            .collect()
    }

    fn bury_payload(&self, payload: String) {
        self.dead
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(0, payload);
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn enqueue(&self, job: &ProcessingJob) -> Result<(), QueueError> {
        let payload = job.to_payload()?;
        self.jobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_front(payload);
        self.notify.notify_one();
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<ProcessingJob>, QueueError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let payload = self
                .jobs
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .pop_back();
            if let Some(payload) = payload {
                match ProcessingJob::from_payload(&payload) {
                    Ok(job) => return Ok(Some(job)),
                    Err(e) => {
                        warn!(error = %e, "discarding malformed job payload to dead letter");
                        self.bury_payload(payload);
                        return Ok(None);
                    }
                }
            }
            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(None);
            }
        }
    }

    async fn dead_letter(&self, job: &ProcessingJob) -> Result<(), QueueError> {
        let payload = job.to_payload()?;
        self.bury_payload(payload);
        Ok(())
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        Ok(self.jobs.lock().unwrap_or_else(|e| e.into_inner()).len() as u64)
    }

    async fn store_result(&self, job_id: &str, result: &JobResult) -> Result<(), QueueError> {
        self.results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(job_id.to_string(), result.clone());
        Ok(())
    }

    async fn fetch_result(&self, job_id: &str) -> Result<Option<JobResult>, QueueError> {
        Ok(self
            .results
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(job_id)
            .cloned())
    }

    async fn publish_progress(
        &self,
        document_id: &str,
        progress: &ProcessingProgress,
    ) -> Result<(), QueueError> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((document_id.to_string(), progress.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileRef, JobSource, ProcessingOptions};
    use chrono::Utc;

    fn sample_job(document_id: &str) -> ProcessingJob {
        ProcessingJob::new(
            document_id.to_string(),
            "project-1".to_string(),
            "user-1".to_string(),
            FileRef {
                stored_filename: "ab/scan-deadbeef.pdf".into(),
                original_filename: "scan.pdf".into(),
                mime_type: "application/pdf".into(),
                size_bytes: 1024,
            },
            ProcessingOptions::default(),
            JobSource::Api,
        )
    }

    #[tokio::test]
    async fn test_jobs_pop_in_fifo_order() {
        let queue = InMemoryQueue::new();
        queue.enqueue(&sample_job("doc-1")).await.unwrap();
        queue.enqueue(&sample_job("doc-2")).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 2);

        let first = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        let second = queue.pop(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(first.document_id, "doc-1");
        assert_eq!(second.document_id, "doc-2");
        assert_eq!(queue.depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pop_times_out_when_empty() {
        let queue = InMemoryQueue::new();
        let popped = queue.pop(Duration::from_millis(5)).await.unwrap();
        assert!(popped.is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_goes_to_dead_letter() {
        let queue = InMemoryQueue::new();
        queue
            .jobs
            .lock()
            .unwrap()
            .push_front("{not json".to_string());

        let popped = queue.pop(Duration::from_millis(5)).await.unwrap();
        assert!(popped.is_none());
        assert_eq!(queue.dead.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_is_inspectable() {
        let queue = InMemoryQueue::new();
        let job = sample_job("doc-1");
        queue.dead_letter(&job).await.unwrap();

        let dead = queue.dead_jobs();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job_id, job.job_id);
    }

    #[tokio::test]
    async fn test_result_round_trip() {
        let queue = InMemoryQueue::new();
        let result = JobResult {
            job_id: "job-1".into(),
            success: true,
            completed_at: Utc::now(),
            pages: Some(3),
            confidence: Some(0.92),
            error: None,
        };
        queue.store_result("job-1", &result).await.unwrap();

        let fetched = queue.fetch_result("job-1").await.unwrap().unwrap();
        assert!(fetched.success);
        assert_eq!(fetched.pages, Some(3));
        assert!(queue.fetch_result("job-2").await.unwrap().is_none());
    }
}
