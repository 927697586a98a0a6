mod memory;

pub use memory::InMemoryDocumentStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Document, DocumentStatus, Page};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence boundary for documents and their extracted pages.
///
/// The pipeline only ever talks to this trait; swapping the in-memory
/// store for a database-backed one is a deployment decision, not a
/// code change in the orchestrator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert_document(&self, document: Document) -> Result<(), StoreError>;

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError>;

    /// Applies a status change together with a progress checkpoint.
    ///
    /// When `status` matches the document's current status this is a
    /// progress/error update only; otherwise the document's transition
    /// rules decide whether the change is legal.
    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        progress: u8,
        error: Option<String>,
    ) -> Result<(), StoreError>;

    async fn create_page(&self, page: Page) -> Result<(), StoreError>;

    async fn get_pages(&self, document_id: &str) -> Result<Vec<Page>, StoreError>;

    /// Removes every stored page for the document, returning how many
    /// were deleted. Reprocessing calls this before writing new pages so
    /// page numbers stay unique per document.
    async fn delete_pages(&self, document_id: &str) -> Result<u64, StoreError>;
}
