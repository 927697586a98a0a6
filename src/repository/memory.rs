use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentStore, StoreError};
use crate::models::{Document, DocumentStatus, Page};

/// Document store backed by process memory.
///
/// Good enough for single-node deployments and for tests; everything is
/// lost on restart, which is acceptable because the source files live in
/// content-addressed storage and can be reprocessed.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: RwLock<HashMap<String, Document>>,
    pages: RwLock<HashMap<String, Vec<Page>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn insert_document(&self, document: Document) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        if documents.contains_key(&document.id) {
            return Err(StoreError::Conflict(format!(
                "document already exists: {}",
                document.id
            )));
        }
        documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.documents.read().await.get(document_id).cloned())
    }

    async fn update_document_status(
        &self,
        document_id: &str,
        status: DocumentStatus,
        progress: u8,
        error: Option<String>,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let document = documents
            .get_mut(document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_string()))?;
        if document.status != status {
            document
                .transition(status)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
        }
        document.advance_progress(progress);
        if error.is_some() {
            document.error = error;
        }
        Ok(())
    }

    async fn create_page(&self, page: Page) -> Result<(), StoreError> {
        if !self
            .documents
            .read()
            .await
            .contains_key(&page.document_id)
        {
            return Err(StoreError::DocumentNotFound(page.document_id.clone()));
        }
        let mut pages = self.pages.write().await;
        let entries = pages.entry(page.document_id.clone()).or_default();
        if entries.iter().any(|p| p.page_number == page.page_number) {
            return Err(StoreError::Conflict(format!(
                "document {} already has page {}",
                page.document_id, page.page_number
            )));
        }
        entries.push(page);
        entries.sort_by_key(|p| p.page_number);
        Ok(())
    }

    async fn get_pages(&self, document_id: &str) -> Result<Vec<Page>, StoreError> {
        Ok(self
            .pages
            .read()
            .await
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_pages(&self, document_id: &str) -> Result<u64, StoreError> {
        let mut pages = self.pages.write().await;
        Ok(pages
            .remove(document_id)
            .map(|removed| removed.len() as u64)
            .unwrap_or(0))
    }
}
