//! Data models for the document processing pipeline.

mod document;
mod job;
mod page;
mod progress;

pub use document::{Document, DocumentStatus, FileRef};
pub use job::{
    JobPriority, JobSource, OcrQuality, ProcessingJob, ProcessingOptions, DEFAULT_MAX_ATTEMPTS,
    JOB_PAYLOAD_VERSION,
};
pub use page::{BoundingBox, Page, PageMetadata, Point};
pub use progress::ProcessingProgress;
