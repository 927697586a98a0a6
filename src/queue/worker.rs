//! Queue consumer.
//!
//! Pops jobs with a bounded wait and checks the shutdown flag between
//! polls; a `select!` over the pop itself could drop a job the broker has
//! already handed over. Failed jobs are re-enqueued with exponential
//! backoff until their attempts run out, then dead-lettered with the
//! document marked failed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::WorkerConfig;
use crate::models::{DocumentStatus, ProcessingJob};
use crate::pipeline::ProcessingOrchestrator;
use crate::repository::DocumentStore;

use super::{JobQueue, JobResult};

pub struct Worker {
    queue: Arc<dyn JobQueue>,
    orchestrator: Arc<ProcessingOrchestrator>,
    store: Arc<dyn DocumentStore>,
    config: WorkerConfig,
    pop_timeout: Duration,
    identity: String,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        orchestrator: Arc<ProcessingOrchestrator>,
        store: Arc<dyn DocumentStore>,
        config: WorkerConfig,
        pop_timeout: Duration,
    ) -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        Self {
            queue,
            orchestrator,
            store,
            config,
            pop_timeout,
            identity: format!("{}:{}", host, std::process::id()),
        }
    }

    /// `hostname:pid`, used to attribute log lines to a consumer.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Consume jobs until the shutdown flag flips. An in-flight job always
    /// runs to completion; the flag is only checked between jobs.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker = %self.identity, "worker started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.queue.pop(self.pop_timeout).await {
                Ok(Some(job)) => self.handle(job, &mut shutdown).await,
                Ok(None) => {}
                Err(e) => {
                    error!(worker = %self.identity, error = %e, "queue pop failed");
                    tokio::select! {
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
        info!(worker = %self.identity, "worker stopped");
    }

    async fn handle(&self, job: ProcessingJob, shutdown: &mut watch::Receiver<bool>) {
        info!(
            worker = %self.identity,
            job = %job.job_id,
            document = %job.document_id,
            attempt = job.attempt + 1,
            max_attempts = job.max_attempts,
            "job started"
        );
        match self.orchestrator.process_document(&job).await {
            Ok(outcome) => {
                let result = JobResult {
                    job_id: job.job_id.clone(),
                    success: true,
                    completed_at: Utc::now(),
                    pages: Some(outcome.pages as u32),
                    confidence: Some(outcome.confidence),
                    error: None,
                };
                if let Err(e) = self.queue.store_result(&job.job_id, &result).await {
                    warn!(job = %job.job_id, error = %e, "result store failed");
                }
            }
            Err(e) => self.handle_failure(job, e.to_string(), shutdown).await,
        }
    }

    async fn handle_failure(
        &self,
        job: ProcessingJob,
        message: String,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        if job.attempts_remaining() {
            let delay = self.config.backoff_ms(job.attempt);
            warn!(
                job = %job.job_id,
                attempt = job.attempt + 1,
                delay_ms = delay,
                error = %message,
                "job failed, re-enqueueing"
            );
            // Shutdown cuts the backoff wait short; the retry is still
            // enqueued so another consumer can pick it up.
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                _ = shutdown.changed() => {}
            }
            let retry = job.next_attempt();
            if let Err(e) = self.queue.enqueue(&retry).await {
                error!(job = %retry.job_id, error = %e, "re-enqueue failed, dead-lettering");
                self.bury(retry, message).await;
            }
        } else {
            error!(
                job = %job.job_id,
                attempts = job.attempt + 1,
                error = %message,
                "attempts exhausted, dead-lettering"
            );
            self.bury(job, message).await;
        }
    }

    async fn bury(&self, job: ProcessingJob, message: String) {
        if let Err(e) = self.queue.dead_letter(&job).await {
            error!(job = %job.job_id, error = %e, "dead-letter failed");
        }
        if let Err(e) = self
            .store
            .update_document_status(
                &job.document_id,
                DocumentStatus::Failed,
                0,
                Some(message.clone()),
            )
            .await
        {
            error!(document = %job.document_id, error = %e, "unable to record failure");
        }
        let result = JobResult {
            job_id: job.job_id.clone(),
            success: false,
            completed_at: Utc::now(),
            pages: None,
            confidence: None,
            error: Some(message),
        };
        if let Err(e) = self.queue.store_result(&job.job_id, &result).await {
            warn!(job = %job.job_id, error = %e, "result store failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::ocr::TesseractEngine;
    use crate::pipeline::PdfOpener;
    use crate::queue::InMemoryQueue;
    use crate::repository::InMemoryDocumentStore;
    use crate::storage::LocalStorage;

    fn worker(dir: &std::path::Path, queue: Arc<InMemoryQueue>) -> Worker {
        let store = Arc::new(InMemoryDocumentStore::new());
        let orchestrator = Arc::new(ProcessingOrchestrator::new(
            PipelineConfig::default(),
            Arc::new(LocalStorage::new(dir)),
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            Arc::new(TesseractEngine::new()),
            Arc::new(PdfOpener),
        ));
        Worker::new(
            queue,
            orchestrator,
            store,
            WorkerConfig::default(),
            Duration::from_millis(10),
        )
    }

    #[test]
    fn test_identity_is_host_and_pid() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(InMemoryQueue::new());
        let worker = worker(dir.path(), queue);
        let (host, pid) = worker.identity().rsplit_once(':').unwrap();
        assert!(!host.is_empty());
        assert!(pid.parse::<u32>().is_ok());
    }

    #[tokio::test]
    async fn test_run_exits_once_shutdown_flips() {
        let dir = tempfile::tempdir().unwrap();
        let queue = Arc::new(InMemoryQueue::new());
        let worker = Arc::new(worker(dir.path(), queue));
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn({
            let worker = Arc::clone(&worker);
            async move { worker.run(rx).await }
        });
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("worker should stop after shutdown")
            .unwrap();
    }
}
