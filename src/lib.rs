//! Document processing pipeline.
//!
//! Docmill turns uploaded documents (PDF, images, DOCX, plain text) into
//! per-page text with positioned bounding boxes. Born-digital PDFs are
//! scored on their embedded text layer and extracted geometrically, with
//! OCR run only over embedded image regions; scanned documents fall back
//! to full-page OCR. Jobs run through a Redis-backed queue with retry,
//! dead-lettering, and a circuit breaker that degrades to inline
//! processing when the broker is down.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod pipeline;
pub mod queue;
pub mod repository;
pub mod storage;
pub mod utils;
