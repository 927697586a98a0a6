//! Live progress snapshots for in-flight runs.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::models::ProcessingProgress;

const DEFAULT_TTL: Duration = Duration::from_secs(300);
const DEFAULT_MAX_ENTRIES: usize = 1024;

struct Tracked {
    progress: ProcessingProgress,
    updated_at: Instant,
}

/// Bounded, expiring map of per-document progress.
///
/// Entries are authoritative only while fresh; after the TTL the persisted
/// document row becomes the source of truth. Updates are sync so the
/// blocking extraction phase can report without a runtime handle. Each
/// document has a single writer at a time.
pub struct ProgressTracker {
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, Tracked>>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_MAX_ENTRIES)
    }
}

impl ProgressTracker {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn update(&self, document_id: &str, progress: ProcessingProgress) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            document_id.to_string(),
            Tracked {
                progress,
                updated_at: Instant::now(),
            },
        );
        if entries.len() > self.max_entries {
            self.evict(&mut entries);
        }
    }

    /// Fresh snapshot for a document, or `None` when absent or expired.
    pub fn get(&self, document_id: &str) -> Option<ProcessingProgress> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(document_id)
            .filter(|t| t.updated_at.elapsed() < self.ttl)
            .map(|t| t.progress.clone())
    }

    pub fn remove(&self, document_id: &str) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(document_id);
    }

    /// Drop expired entries; while still over capacity, drop the stalest.
    fn evict(&self, entries: &mut HashMap<String, Tracked>) {
        entries.retain(|_, t| t.updated_at.elapsed() < self.ttl);
        while entries.len() > self.max_entries {
            let Some(stalest) = entries
                .iter()
                .min_by_key(|(_, t)| t.updated_at)
                .map(|(id, _)| id.clone())
            else {
                break;
            };
            entries.remove(&stalest);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(progress: u8) -> ProcessingProgress {
        ProcessingProgress::started(5).at_step("extracting", progress)
    }

    #[test]
    fn test_update_then_get() {
        let tracker = ProgressTracker::default();
        tracker.update("doc-1", snapshot(30));
        let got = tracker.get("doc-1").unwrap();
        assert_eq!(got.progress, 30);
        assert!(tracker.get("doc-2").is_none());
    }

    #[test]
    fn test_expired_entries_are_invisible() {
        let tracker = ProgressTracker::new(Duration::ZERO, 16);
        tracker.update("doc-1", snapshot(30));
        assert!(tracker.get("doc-1").is_none());
    }

    #[test]
    fn test_capacity_evicts_stalest_first() {
        let tracker = ProgressTracker::new(Duration::from_secs(60), 2);
        tracker.update("old", snapshot(10));
        std::thread::sleep(Duration::from_millis(5));
        tracker.update("mid", snapshot(20));
        std::thread::sleep(Duration::from_millis(5));
        tracker.update("new", snapshot(30));

        assert!(tracker.get("old").is_none());
        assert!(tracker.get("mid").is_some());
        assert!(tracker.get("new").is_some());
    }

    #[test]
    fn test_remove() {
        let tracker = ProgressTracker::default();
        tracker.update("doc-1", snapshot(30));
        tracker.remove("doc-1");
        assert!(tracker.get("doc-1").is_none());
    }
}
