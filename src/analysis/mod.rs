//! Text-quality analysis for the extraction decision.

mod quality;

pub use quality::{BornDigitalScorer, QualityReport, TextMetrics};
