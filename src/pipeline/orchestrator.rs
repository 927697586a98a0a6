//! Drives documents through extraction, augmentation, and persistence.

use std::sync::Arc;
use std::time::Instant;

use futures::future;
use thiserror::Error;
use tokio::task;
use tracing::{debug, error, info, warn};

use crate::analysis::BornDigitalScorer;
use crate::config::PipelineConfig;
use crate::extract::{docx, DocxError};
use crate::models::{
    Document, DocumentStatus, FileRef, JobSource, ProcessingJob, ProcessingOptions,
    ProcessingProgress,
};
use crate::ocr::{optimize_for_ocr, OcrEngine, OcrError};
use crate::pdf::{GeometricExtractor, PdfError};
use crate::queue::JobQueue;
use crate::repository::{DocumentStore, StoreError};
use crate::storage::{FileStorage, StorageError};
use crate::utils::mime::{self, DocumentKind};

use super::assemble::{words_to_boxes, PageAssembler, PageDraft};
use super::augment::SelectiveOcrAugmenter;
use super::fallback::FullPageOcrFallback;
use super::progress::ProgressTracker;
use super::source::{DocumentOpener, PageSource};

/// Progress checkpoints a run reports, in order.
const STEP_PREPARING: (&str, u8) = ("preparing", 10);
const STEP_LOADING: (&str, u8) = ("loading", 20);
const STEP_EXTRACTING: (&str, u8) = ("extracting", 30);
const STEP_PERSISTING: (&str, u8) = ("persisting", 70);
const TOTAL_STEPS: u32 = 5;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("unsupported mime type: {0}")]
    UnsupportedMime(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Ocr(#[from] OcrError),

    #[error(transparent)]
    Docx(#[from] DocxError),

    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("extraction task failed: {0}")]
    Task(String),
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct ProcessingOutcome {
    pub document_id: String,
    pub pages: usize,
    pub confidence: f64,
    pub duration_ms: u64,
}

struct ExtractionInput {
    document_id: String,
    kind: DocumentKind,
    bytes: Vec<u8>,
    language: String,
    options: ProcessingOptions,
}

/// Coordinates one document run end to end: route decision, extraction,
/// OCR, assembly, persistence, and progress reporting. Never blocks the
/// async runtime; the heavy extraction phase runs on the blocking pool.
pub struct ProcessingOrchestrator {
    storage: Arc<dyn FileStorage>,
    store: Arc<dyn DocumentStore>,
    engine: Arc<dyn OcrEngine>,
    opener: Arc<dyn DocumentOpener>,
    scorer: BornDigitalScorer,
    extractor: GeometricExtractor,
    augmenter: SelectiveOcrAugmenter,
    fallback: FullPageOcrFallback,
    assembler: PageAssembler,
    tracker: ProgressTracker,
    publisher: Option<Arc<dyn JobQueue>>,
    config: PipelineConfig,
}

impl ProcessingOrchestrator {
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn FileStorage>,
        store: Arc<dyn DocumentStore>,
        engine: Arc<dyn OcrEngine>,
        opener: Arc<dyn DocumentOpener>,
    ) -> Self {
        let scorer = BornDigitalScorer::new(config.quality.clone());
        let extractor = GeometricExtractor::new(config.raster.epsilon_px);
        let augmenter = SelectiveOcrAugmenter::new(
            Arc::clone(&engine),
            config.raster.clone(),
            config.ocr.min_word_confidence,
        );
        let fallback = FullPageOcrFallback::new(
            Arc::clone(&engine),
            config.raster.clone(),
            config.ocr.min_word_confidence,
        );
        Self {
            storage,
            store,
            engine,
            opener,
            scorer,
            extractor,
            augmenter,
            fallback,
            assembler: PageAssembler,
            tracker: ProgressTracker::default(),
            publisher: None,
            config,
        }
    }

    /// Attach a queue whose progress channel mirrors checkpoint updates.
    pub fn with_publisher(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.publisher = Some(queue);
        self
    }

    /// MIME types `process_document` accepts.
    pub fn supported_mime_types() -> &'static [&'static str] {
        mime::SUPPORTED_MIME_TYPES
    }

    /// Store an upload and register its document.
    pub async fn ingest(
        &self,
        original_filename: &str,
        bytes: &[u8],
        project_id: &str,
    ) -> Result<Document, ProcessingError> {
        let mime_type = mime::detect_mime(bytes, original_filename);
        if !mime::is_supported_mime(&mime_type) {
            return Err(ProcessingError::UnsupportedMime(mime_type));
        }
        let stored = self.storage.put_file(original_filename, &mime_type, bytes).await?;
        let document = Document::new(
            uuid::Uuid::new_v4().to_string(),
            project_id.to_string(),
            FileRef {
                stored_filename: stored.stored_filename,
                original_filename: original_filename.to_string(),
                mime_type,
                size_bytes: stored.size_bytes,
            },
        );
        self.store.insert_document(document.clone()).await?;
        info!(document = %document.id, file = %document.file.original_filename, "document ingested");
        Ok(document)
    }

    /// Build a first-attempt job for a document.
    pub fn create_job(
        &self,
        document: &Document,
        user_id: &str,
        options: ProcessingOptions,
        source: JobSource,
    ) -> ProcessingJob {
        let mut job = ProcessingJob::new(
            document.id.clone(),
            document.project_id.clone(),
            user_id.to_string(),
            document.file.clone(),
            options,
            source,
        );
        job.max_attempts = self.config.worker.max_attempts;
        job
    }

    /// Build a reprocessing job for an existing document and move it back
    /// to the uploaded state. Prior pages are cleared when the job runs.
    pub async fn reprocess_document(
        &self,
        document_id: &str,
        user_id: &str,
        options: ProcessingOptions,
        source: JobSource,
    ) -> Result<ProcessingJob, ProcessingError> {
        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| ProcessingError::DocumentNotFound(document_id.to_string()))?;
        self.store
            .update_document_status(document_id, DocumentStatus::Uploading, 0, None)
            .await?;
        self.tracker.remove(document_id);
        let mut job = self.create_job(&document, user_id, options, source);
        job.reprocess = true;
        info!(document = %document_id, "reprocess requested");
        Ok(job)
    }

    /// Live progress for a document, falling back to the persisted row
    /// once the in-memory snapshot has expired.
    pub async fn get_processing_progress(
        &self,
        document_id: &str,
    ) -> Result<Option<ProcessingProgress>, ProcessingError> {
        if let Some(live) = self.tracker.get(document_id) {
            return Ok(Some(live));
        }
        let Some(document) = self.store.get_document(document_id).await? else {
            return Ok(None);
        };
        Ok(Some(progress_from_document(&document)))
    }

    /// Run a job to completion. On error the document is marked failed
    /// with the message persisted; the error is still returned so callers
    /// can retry or dead-letter.
    pub async fn process_document(
        self: &Arc<Self>,
        job: &ProcessingJob,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        let started = Instant::now();
        match self.run(job, started).await {
            Ok(outcome) => {
                info!(
                    document = %outcome.document_id,
                    pages = outcome.pages,
                    confidence = outcome.confidence,
                    duration_ms = outcome.duration_ms,
                    "document processed"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(document = %job.document_id, error = %e, "processing failed");
                self.mark_failed(&job.document_id, &e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn run(
        self: &Arc<Self>,
        job: &ProcessingJob,
        started: Instant,
    ) -> Result<ProcessingOutcome, ProcessingError> {
        // The payload is self-contained, so a consumer with its own store
        // registers the document on first sight.
        if self.store.get_document(&job.document_id).await?.is_none() {
            self.store
                .insert_document(Document::new(
                    job.document_id.clone(),
                    job.project_id.clone(),
                    job.file.clone(),
                ))
                .await?;
        }

        self.tracker
            .update(&job.document_id, ProcessingProgress::started(TOTAL_STEPS));
        self.checkpoint(&job.document_id, STEP_PREPARING).await?;
        let kind = DocumentKind::from_mime(&job.file.mime_type)
            .ok_or_else(|| ProcessingError::UnsupportedMime(job.file.mime_type.clone()))?;
        if job.reprocess {
            let removed = self.store.delete_pages(&job.document_id).await?;
            debug!(document = %job.document_id, removed, "prior pages cleared for reprocessing");
        }

        self.checkpoint(&job.document_id, STEP_LOADING).await?;
        let bytes = self.storage.get_file(&job.file.stored_filename).await?;

        self.checkpoint(&job.document_id, STEP_EXTRACTING).await?;
        let input = ExtractionInput {
            document_id: job.document_id.clone(),
            kind,
            bytes,
            language: job
                .options
                .language
                .clone()
                .unwrap_or_else(|| self.config.ocr.language.clone()),
            options: job.options.clone(),
        };
        let this = Arc::clone(self);
        let drafts = task::spawn_blocking(move || this.extract_blocking(input))
            .await
            .map_err(|e| ProcessingError::Task(e.to_string()))??;

        self.checkpoint(&job.document_id, STEP_PERSISTING).await?;
        let assembled = self.assembler.assemble(&job.document_id, drafts);
        future::try_join_all(
            assembled
                .pages
                .iter()
                .map(|page| self.store.create_page(page.clone())),
        )
        .await?;

        self.store
            .update_document_status(&job.document_id, DocumentStatus::Processed, 100, None)
            .await?;
        let done = self
            .tracker
            .get(&job.document_id)
            .unwrap_or_else(|| ProcessingProgress::started(TOTAL_STEPS))
            .completed();
        self.tracker.update(&job.document_id, done.clone());
        self.publish(&job.document_id, &done).await;

        Ok(ProcessingOutcome {
            document_id: job.document_id.clone(),
            pages: assembled.pages.len(),
            confidence: assembled.confidence,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Blocking extraction phase; runs on the blocking pool.
    fn extract_blocking(&self, input: ExtractionInput) -> Result<Vec<PageDraft>, ProcessingError> {
        match input.kind {
            DocumentKind::Pdf => self.extract_pdf(&input),
            DocumentKind::Image => self.extract_image(&input),
            DocumentKind::Docx => Ok(vec![text_draft(docx::extract_text(&input.bytes)?)]),
            DocumentKind::PlainText => Ok(vec![text_draft(
                String::from_utf8_lossy(&input.bytes).into_owned(),
            )]),
        }
    }

    fn extract_pdf(&self, input: &ExtractionInput) -> Result<Vec<PageDraft>, ProcessingError> {
        let temp = tempfile::Builder::new()
            .prefix("docmill-")
            .suffix(".pdf")
            .tempfile()?;
        std::fs::write(temp.path(), &input.bytes)?;
        let source = self.opener.open(temp.path())?;
        let page_count = source.page_count();

        let text = match source.full_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(document = %input.document_id, error = %e, "text layer unavailable, scoring as empty");
                String::new()
            }
        };
        let report = self.scorer.assess(&text, page_count);
        let direct =
            !input.options.ocr_enabled() || self.scorer.is_direct_preferred(report.confidence);
        info!(
            document = %input.document_id,
            pages = page_count,
            confidence = report.confidence,
            direct,
            "extraction route chosen"
        );

        if direct {
            Ok(self.extract_direct(input, source.as_ref(), page_count, report.confidence))
        } else {
            if !self.engine.is_available() {
                return Err(OcrError::NotAvailable(self.engine.availability_hint()).into());
            }
            Ok(self.fallback.run(source.as_ref(), &input.language))
        }
    }

    /// Direct path: per-page text plus geometry, with OCR only over the
    /// embedded image regions. Unreadable pages are logged and skipped.
    fn extract_direct(
        &self,
        input: &ExtractionInput,
        source: &dyn PageSource,
        page_count: u32,
        confidence: f64,
    ) -> Vec<PageDraft> {
        let augment_allowed = input.options.ocr_enabled()
            && input.options.extract_images()
            && self.engine.is_available();

        let mut drafts = Vec::with_capacity(page_count as usize);
        for page_number in 1..=page_count {
            let started = Instant::now();
            let viewport = match source.viewport(page_number, self.config.raster.viewport_scale) {
                Ok(viewport) => viewport,
                Err(e) => {
                    warn!(page = page_number, error = %e, "page unreadable, skipped");
                    continue;
                }
            };
            let content = match source.page_content(page_number) {
                Ok(content) => content,
                Err(e) => {
                    warn!(page = page_number, error = %e, "page content unparseable, skipped");
                    continue;
                }
            };
            let geometry = self.extractor.extract(&viewport, &content);
            let mut text = match source.page_text(page_number) {
                Ok(text) => text,
                Err(e) => {
                    warn!(page = page_number, error = %e, "page text unavailable");
                    String::new()
                }
            };

            let mut boxes = geometry.text_boxes;
            let mut word_boxes = Vec::new();
            let mut dpi = 0;
            if augment_allowed && !geometry.image_boxes.is_empty() {
                match source.rasterize_page(page_number, self.config.raster.augment_dpi) {
                    Ok(raster) => {
                        dpi = raster.dpi;
                        let augmented = self.augmenter.augment(
                            &raster,
                            &viewport,
                            &geometry.image_boxes,
                            &input.language,
                        );
                        if !augmented.is_empty() {
                            debug!(
                                page = page_number,
                                regions = augmented.regions_recognized,
                                "image regions recognized"
                            );
                            if !text.is_empty() && !text.ends_with('\n') {
                                text.push('\n');
                            }
                            text.push_str(&augmented.merged_text());
                        }
                        word_boxes = augmented.word_boxes;
                    }
                    Err(e) => {
                        warn!(page = page_number, error = %e, "rasterization failed, image regions not recognized");
                    }
                }
            }
            boxes.extend(geometry.image_boxes);
            boxes.extend(word_boxes);

            // Interpolate within the extraction band so long documents show
            // movement between checkpoints.
            if let Some(snapshot) = self.tracker.get(&input.document_id) {
                let band = (f64::from(page_number) / f64::from(page_count) * 40.0) as u8;
                self.tracker.update(
                    &input.document_id,
                    snapshot.at_step(STEP_EXTRACTING.0, STEP_EXTRACTING.1 + band.min(40)),
                );
            }

            drafts.push(PageDraft {
                page_number,
                text,
                confidence,
                boxes,
                width: viewport.width,
                height: viewport.height,
                dpi,
                processing_time_ms: started.elapsed().as_millis() as u64,
            });
        }
        drafts
    }

    /// A standalone raster image is treated as a single scanned page.
    fn extract_image(&self, input: &ExtractionInput) -> Result<Vec<PageDraft>, ProcessingError> {
        let started = Instant::now();
        let image = image::load_from_memory(&input.bytes)?;
        let (width, height) = (f64::from(image.width()), f64::from(image.height()));

        if !input.options.ocr_enabled() {
            return Ok(vec![PageDraft {
                page_number: 1,
                width,
                height,
                processing_time_ms: started.elapsed().as_millis() as u64,
                ..PageDraft::default()
            }]);
        }
        if !self.engine.is_available() {
            return Err(OcrError::NotAvailable(self.engine.availability_hint()).into());
        }

        let prepared = optimize_for_ocr(&image, self.config.raster.max_dimension);
        let output = self.engine.recognize(&prepared, &input.language)?;
        let scale_x = width / f64::from(prepared.width());
        let scale_y = height / f64::from(prepared.height());
        let boxes = words_to_boxes(
            &output.words,
            self.config.ocr.min_word_confidence,
            scale_x,
            scale_y,
            0,
        );
        Ok(vec![PageDraft {
            page_number: 1,
            text: output.text,
            confidence: (output.confidence / 100.0).clamp(0.0, 1.0),
            boxes,
            width,
            height,
            dpi: 0,
            processing_time_ms: started.elapsed().as_millis() as u64,
        }])
    }

    async fn checkpoint(
        &self,
        document_id: &str,
        (step, progress): (&str, u8),
    ) -> Result<(), ProcessingError> {
        self.store
            .update_document_status(document_id, DocumentStatus::Processing, progress, None)
            .await?;
        let snapshot = self
            .tracker
            .get(document_id)
            .unwrap_or_else(|| ProcessingProgress::started(TOTAL_STEPS))
            .at_step(step, progress);
        self.tracker.update(document_id, snapshot.clone());
        self.publish(document_id, &snapshot).await;
        Ok(())
    }

    /// Record a terminal failure. Best effort: a store that is itself
    /// failing only gets logged.
    async fn mark_failed(&self, document_id: &str, message: &str) {
        if let Err(e) = self
            .store
            .update_document_status(
                document_id,
                DocumentStatus::Failed,
                0,
                Some(message.to_string()),
            )
            .await
        {
            error!(document = %document_id, error = %e, "unable to record failure");
        }
        let failed = self
            .tracker
            .get(document_id)
            .unwrap_or_else(|| ProcessingProgress::started(TOTAL_STEPS))
            .failed(message.to_string());
        self.tracker.update(document_id, failed.clone());
        self.publish(document_id, &failed).await;
    }

    async fn publish(&self, document_id: &str, progress: &ProcessingProgress) {
        if let Some(queue) = &self.publisher {
            if let Err(e) = queue.publish_progress(document_id, progress).await {
                debug!(document = %document_id, error = %e, "progress publish failed");
            }
        }
    }
}

fn text_draft(text: String) -> PageDraft {
    PageDraft {
        page_number: 1,
        text,
        confidence: 1.0,
        ..PageDraft::default()
    }
}

fn progress_from_document(document: &Document) -> ProcessingProgress {
    let current_step = match document.status {
        DocumentStatus::Uploading => "queued",
        DocumentStatus::Processing => "processing",
        DocumentStatus::Processed => "completed",
        DocumentStatus::Failed => "failed",
        DocumentStatus::Deleted => "deleted",
    };
    ProcessingProgress {
        status: document.status,
        progress: document.progress,
        current_step: current_step.to_string(),
        total_steps: TOTAL_STEPS,
        started_at: document.updated_at,
        estimated_completion: None,
        error: document.error.clone(),
    }
}
