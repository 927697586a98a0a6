//! Live processing progress, published per document while a run is active.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::document::DocumentStatus;

/// Snapshot of a run's progress. Ephemeral: authoritative only while the
/// run is live plus a short grace window, after which the persisted
/// document row is the source of truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingProgress {
    pub status: DocumentStatus,
    /// 0..=100.
    pub progress: u8,
    pub current_step: String,
    pub total_steps: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessingProgress {
    /// Progress at the start of a run.
    pub fn started(total_steps: u32) -> Self {
        Self {
            status: DocumentStatus::Processing,
            progress: 0,
            current_step: "queued".to_string(),
            total_steps,
            started_at: Utc::now(),
            estimated_completion: None,
            error: None,
        }
    }

    /// Advance to a named step, refreshing the linear completion estimate.
    pub fn at_step(&self, step: &str, progress: u8) -> Self {
        let mut next = self.clone();
        next.current_step = step.to_string();
        next.progress = progress.min(100).max(self.progress);
        next.estimated_completion = next.estimate_completion(Utc::now());
        next
    }

    /// Terminal success snapshot.
    pub fn completed(&self) -> Self {
        let mut done = self.clone();
        done.status = DocumentStatus::Processed;
        done.progress = 100;
        done.current_step = "completed".to_string();
        done.estimated_completion = None;
        done
    }

    /// Terminal failure snapshot.
    pub fn failed(&self, error: String) -> Self {
        let mut failed = self.clone();
        failed.status = DocumentStatus::Failed;
        failed.progress = 0;
        failed.current_step = "failed".to_string();
        failed.error = Some(error);
        failed.estimated_completion = None;
        failed
    }

    /// Linear extrapolation from elapsed time and percent complete.
    fn estimate_completion(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.progress == 0 || self.progress >= 100 {
            return None;
        }
        let elapsed = now - self.started_at;
        let total_ms = elapsed.num_milliseconds() * 100 / i64::from(self.progress);
        Some(self.started_at + Duration::milliseconds(total_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_progress_is_monotone() {
        let p = ProcessingProgress::started(5);
        let p = p.at_step("extract", 30);
        let p2 = p.at_step("late-report", 10);
        assert_eq!(p2.progress, 30);
        assert_eq!(p2.current_step, "late-report");
    }

    #[test]
    fn test_failure_resets_progress_and_records_error() {
        let p = ProcessingProgress::started(5).at_step("extract", 30);
        let failed = p.failed("decode error".into());
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert_eq!(failed.progress, 0);
        assert_eq!(failed.error.as_deref(), Some("decode error"));
    }

    #[test]
    fn test_completed_clears_estimate() {
        let p = ProcessingProgress::started(5).at_step("persist", 70);
        let done = p.completed();
        assert_eq!(done.progress, 100);
        assert!(done.estimated_completion.is_none());
    }
}
