//! Optical character recognition.
//!
//! The engine trait keeps recognition pluggable; the default implementation
//! shells out to Tesseract and parses its TSV output for per-word boxes and
//! confidences. Callers hand in already-decoded images (full-page rasters
//! or region crops), optionally run through [`optimize_for_ocr`] first.

mod engine;
mod preprocess;
mod tesseract;

pub use engine::{OcrEngine, OcrError, OcrOutput, OcrWord};
pub use preprocess::optimize_for_ocr;
pub use tesseract::TesseractEngine;
