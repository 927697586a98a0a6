//! Document processing pipeline.
//!
//! [`ProcessingOrchestrator`] is the entry point: it decides between direct
//! geometric extraction and full-page OCR using the born-digital score,
//! augments embedded image regions selectively, assembles per-page results,
//! and reports progress while a job runs. The [`PageSource`] seam keeps the
//! pipeline testable without the poppler tools installed.

mod assemble;
mod augment;
mod fallback;
mod orchestrator;
mod progress;
mod source;

pub use assemble::{words_to_boxes, AssembledDocument, PageAssembler, PageDraft};
pub use augment::{RegionAugmentation, SelectiveOcrAugmenter};
pub use fallback::FullPageOcrFallback;
pub use orchestrator::{ProcessingError, ProcessingOrchestrator, ProcessingOutcome};
pub use progress::ProgressTracker;
pub use source::{DocumentOpener, PageSource, PdfOpener};
