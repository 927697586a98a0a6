//! Redis-backed job queue.
//!
//! Jobs live in a list (LPUSH to enqueue, BRPOP to consume), progress goes
//! out over pub/sub, and results are stored under per-job keys with a TTL.
//! The dead-letter list is trimmed to a fixed length so poisoned payloads
//! cannot grow it without bound.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::config::QueueConfig;
use crate::models::{ProcessingJob, ProcessingProgress};

use super::{JobQueue, JobResult, QueueError};

pub struct RedisQueue {
    conn: ConnectionManager,
    name: String,
    result_ttl_secs: u64,
    dead_letter_max: i64,
}

impl RedisQueue {
    pub async fn connect(config: &QueueConfig) -> Result<Self, QueueError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| QueueError::Connection(format!("invalid redis url: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;
        Ok(Self {
            conn,
            name: config.name.clone(),
            result_ttl_secs: config.result_ttl_secs,
            dead_letter_max: config.dead_letter_max,
        })
    }

    fn dead_key(&self) -> String {
        format!("{}:dead", self.name)
    }

    fn result_key(&self, job_id: &str) -> String {
        format!("{}:result:{}", self.name, job_id)
    }

    fn progress_channel(&self, document_id: &str) -> String {
        format!("{}:progress:{}", self.name, document_id)
    }

    /// Park a raw payload on the dead-letter list, keeping it bounded.
    async fn bury_payload(&self, payload: &str) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .lpush(self.dead_key(), payload)
            .ignore()
            .ltrim(self.dead_key(), 0, (self.dead_letter_max - 1) as isize)
            .ignore()
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job: &ProcessingJob) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let payload = job.to_payload()?;
        conn.lpush::<_, _, ()>(&self.name, payload)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn pop(&self, timeout: Duration) -> Result<Option<ProcessingJob>, QueueError> {
        let mut conn = self.conn.clone();
        let reply: Option<(String, String)> = conn
            .brpop(&self.name, timeout.as_secs_f64())
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        let Some((_, payload)) = reply else {
            return Ok(None);
        };
        match ProcessingJob::from_payload(&payload) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                // An unparseable payload would wedge the worker if requeued.
                warn!(error = %e, "discarding malformed job payload to dead letter");
                self.bury_payload(&payload).await?;
                Ok(None)
            }
        }
    }

    async fn dead_letter(&self, job: &ProcessingJob) -> Result<(), QueueError> {
        let payload = job.to_payload()?;
        self.bury_payload(&payload).await
    }

    async fn depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let depth: u64 = conn
            .llen(&self.name)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(depth)
    }

    async fn store_result(&self, job_id: &str, result: &JobResult) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(result)?;
        conn.set_ex::<_, _, ()>(self.result_key(job_id), json, self.result_ttl_secs)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn fetch_result(&self, job_id: &str) -> Result<Option<JobResult>, QueueError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(self.result_key(job_id))
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(raw.map(|json| serde_json::from_str(&json)).transpose()?)
    }

    async fn publish_progress(
        &self,
        document_id: &str,
        progress: &ProcessingProgress,
    ) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(progress)?;
        conn.publish::<_, _, ()>(self.progress_channel(document_id), json)
            .await
            .map_err(|e| QueueError::Backend(e.to_string()))?;
        Ok(())
    }
}
