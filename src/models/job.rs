//! Processing job payloads carried over the queue.
//!
//! The wire shape is JSON with camelCase keys. `version` tags the payload
//! schema so old workers can reject jobs they do not understand. A job is
//! immutable once enqueued except for `attempt`, which increments each time
//! the worker re-queues it after a failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::FileRef;

/// Current payload schema version.
pub const JOB_PAYLOAD_VERSION: u32 = 1;

/// Default number of delivery attempts before a job is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Requested OCR quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrQuality {
    Low,
    Medium,
    High,
}

/// Job priority hint. The queue itself is FIFO; priority is carried for
/// consumers that route to multiple queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    Normal,
    High,
}

/// Where the job originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobSource {
    Api,
    Cli,
}

/// Caller-supplied processing options.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extract_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preserve_formatting: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<OcrQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<JobPriority>,
}

impl ProcessingOptions {
    /// OCR defaults to enabled unless explicitly turned off.
    pub fn ocr_enabled(&self) -> bool {
        self.ocr_enabled.unwrap_or(true)
    }

    /// Image-region extraction defaults to enabled.
    pub fn extract_images(&self) -> bool {
        self.extract_images.unwrap_or(true)
    }

    /// Recognition language, defaulting to English.
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or("eng")
    }

    pub fn quality(&self) -> OcrQuality {
        self.quality.unwrap_or(OcrQuality::Medium)
    }
}

/// A unit of work handed from the submitting process to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub job_id: String,
    pub document_id: String,
    pub project_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    pub file: FileRef,
    #[serde(default)]
    pub options: ProcessingOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub source: JobSource,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub reprocess: bool,
    pub version: u32,
    pub attempt: u32,
    pub max_attempts: u32,
}

impl ProcessingJob {
    /// Build a first-attempt job for a document.
    pub fn new(
        document_id: String,
        project_id: String,
        user_id: String,
        file: FileRef,
        options: ProcessingOptions,
        source: JobSource,
    ) -> Self {
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            document_id,
            project_id,
            user_id,
            tenant_id: None,
            file,
            options,
            webhook: None,
            metadata: None,
            source,
            created_at: Utc::now(),
            reprocess: false,
            version: JOB_PAYLOAD_VERSION,
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Copy of this job with the attempt counter incremented, for re-queue.
    pub fn next_attempt(&self) -> Self {
        let mut job = self.clone();
        job.attempt += 1;
        job
    }

    /// Whether another delivery attempt is allowed after a failure.
    pub fn attempts_remaining(&self) -> bool {
        self.attempt + 1 < self.max_attempts
    }

    /// Serialize to the queue payload string.
    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialize from a queue payload string.
    pub fn from_payload(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_job() -> ProcessingJob {
        ProcessingJob::new(
            "doc-1".into(),
            "proj-1".into(),
            "user-1".into(),
            FileRef {
                stored_filename: "ab/scan-abcdef12.pdf".into(),
                original_filename: "scan.pdf".into(),
                mime_type: "application/pdf".into(),
                size_bytes: 2048,
            },
            ProcessingOptions::default(),
            JobSource::Api,
        )
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let job = sample_job();
        let payload = job.to_payload().unwrap();
        let value: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert!(value.get("jobId").is_some());
        assert!(value.get("documentId").is_some());
        assert_eq!(value["source"], "api");
        assert_eq!(value["version"], 1);
        assert_eq!(value["attempt"], 0);
        assert_eq!(value["maxAttempts"], 3);
        assert_eq!(value["file"]["storedFilename"], "ab/scan-abcdef12.pdf");
        // Optional fields stay off the wire when unset.
        assert!(value.get("tenantId").is_none());
        assert!(value.get("webhook").is_none());
        assert!(value.get("reprocess").is_none());
    }

    #[test]
    fn test_payload_roundtrip() {
        let mut job = sample_job();
        job.tenant_id = Some("tenant-9".into());
        job.options.ocr_enabled = Some(false);
        job.options.quality = Some(OcrQuality::High);
        let payload = job.to_payload().unwrap();
        let back = ProcessingJob::from_payload(&payload).unwrap();
        assert_eq!(back.job_id, job.job_id);
        assert_eq!(back.tenant_id.as_deref(), Some("tenant-9"));
        assert_eq!(back.options.quality, Some(OcrQuality::High));
        assert!(!back.options.ocr_enabled());
    }

    #[test]
    fn test_attempt_accounting() {
        let job = sample_job();
        assert!(job.attempts_remaining());
        let second = job.next_attempt();
        assert_eq!(second.attempt, 1);
        assert!(second.attempts_remaining());
        let third = second.next_attempt();
        assert_eq!(third.attempt, 2);
        // attempt 2 of max 3 is the final allowed delivery
        assert!(!third.attempts_remaining());
    }

    #[test]
    fn test_options_defaults() {
        let options = ProcessingOptions::default();
        assert!(options.ocr_enabled());
        assert!(options.extract_images());
        assert_eq!(options.language(), "eng");
        assert_eq!(options.quality(), OcrQuality::Medium);
    }
}
