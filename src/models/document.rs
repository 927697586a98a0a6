//! Document model and processing lifecycle.
//!
//! A document moves through a small state machine while the pipeline runs:
//! `uploading → processing → processed | failed`, with `processing →
//! uploading` reachable only through an explicit reprocess. Status changes
//! go through [`Document::transition`] so invalid jumps are rejected at the
//! model layer rather than scattered through callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploading,
    Processing,
    Processed,
    Failed,
    Deleted,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploading => "uploading",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploading" => Some(Self::Uploading),
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Whether a transition to `next` is allowed.
    ///
    /// `Processing → Uploading` is the reprocess edge; everything else
    /// follows the forward flow. `Deleted` is terminal.
    pub fn can_transition(&self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        match (self, next) {
            (Uploading, Processing) => true,
            (Processing, Processed) | (Processing, Failed) => true,
            (Processing, Uploading) => true,
            (Processed, Uploading) | (Failed, Uploading) => true,
            (Processed, Processing) | (Failed, Processing) => true,
            (_, Deleted) => !matches!(self, Deleted),
            _ => false,
        }
    }
}

/// Reference to the stored upload backing a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Name under which the blob is stored.
    pub stored_filename: String,
    /// Filename as uploaded by the user.
    pub original_filename: String,
    /// MIME type of the content.
    pub mime_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// A document owned by the processing orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier.
    pub id: String,
    /// Owning project.
    pub project_id: String,
    /// Stored file backing this document.
    pub file: FileRef,
    /// Current lifecycle status.
    pub status: DocumentStatus,
    /// Processing progress, 0..=100. Monotone within one run.
    pub progress: u8,
    /// Error message from the last failed run, if any.
    pub error: Option<String>,
    /// When processing last completed successfully.
    pub processed_at: Option<DateTime<Utc>>,
    /// When the document was created.
    pub created_at: DateTime<Utc>,
    /// When the document was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Error returned when a status transition is not allowed.
#[derive(Debug, thiserror::Error)]
#[error("invalid document transition: {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: DocumentStatus,
    pub to: DocumentStatus,
}

impl Document {
    /// Create a freshly uploaded document.
    pub fn new(id: String, project_id: String, file: FileRef) -> Self {
        let now = Utc::now();
        Self {
            id,
            project_id,
            file,
            status: DocumentStatus::Uploading,
            progress: 0,
            error: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to a new status, enforcing the state machine.
    ///
    /// Entering `Processed` clears the error and stamps `processed_at`;
    /// entering `Failed` resets progress to 0.
    pub fn transition(&mut self, next: DocumentStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        match next {
            DocumentStatus::Processed => {
                self.error = None;
                self.progress = 100;
                self.processed_at = Some(self.updated_at);
            }
            DocumentStatus::Failed => {
                self.progress = 0;
            }
            // A new run starts from zero; monotonicity holds within a run,
            // not across runs.
            DocumentStatus::Processing | DocumentStatus::Uploading => {
                self.progress = 0;
                self.error = None;
            }
            DocumentStatus::Deleted => {}
        }
        Ok(())
    }

    /// Advance progress within a run. Regressions are ignored so progress
    /// stays monotone even if steps report out of order.
    pub fn advance_progress(&mut self, progress: u8) {
        let clamped = progress.min(100);
        if clamped > self.progress {
            self.progress = clamped;
            self.updated_at = Utc::now();
        }
    }
}
