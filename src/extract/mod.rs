//! Text extraction for non-PDF document formats.

pub mod docx;

pub use docx::DocxError;
