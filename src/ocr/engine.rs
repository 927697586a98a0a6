//! The recognition engine abstraction.

use image::DynamicImage;
use thiserror::Error;

use crate::utils::cmd::CommandError;

/// Errors from a recognition attempt.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("ocr engine not available: {0}")]
    NotAvailable(String),

    #[error("ocr failed: {0}")]
    Failed(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CommandError> for OcrError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::ToolNotFound(tool) => OcrError::NotAvailable(tool),
            CommandError::Failed(msg) => OcrError::Failed(msg),
            CommandError::Io(io) => OcrError::Io(io),
        }
    }
}

/// One recognized word, with bounds in the input image's pixel space.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrWord {
    pub text: String,
    /// Engine-reported confidence, 0..=100.
    pub confidence: f64,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Recognition result for one image.
#[derive(Debug, Clone, Default)]
pub struct OcrOutput {
    pub text: String,
    /// Mean word confidence, 0..=100.
    pub confidence: f64,
    pub words: Vec<OcrWord>,
    pub processing_time_ms: u64,
}

impl OcrOutput {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A recognition engine. Implementations are called from blocking worker
/// contexts, so the methods are synchronous.
pub trait OcrEngine: Send + Sync {
    fn engine_name(&self) -> &'static str;

    /// Whether the engine's dependencies are present on this host.
    fn is_available(&self) -> bool;

    /// Human-readable install hint when the engine is unavailable.
    fn availability_hint(&self) -> String;

    /// Recognize text in an image, returning text plus per-word boxes in
    /// the image's own pixel space.
    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<OcrOutput, OcrError>;
}
