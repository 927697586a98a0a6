//! Heuristic scoring of extracted text quality.
//!
//! Born-digital PDFs carry a text layer worth keeping; scanned documents
//! produce either nothing or decode garbage when the text layer is read
//! directly. The scorer turns a handful of lexical statistics into a 0..1
//! confidence that direct extraction is good enough to skip OCR. All the
//! weights and targets are tuning knobs from [`QualityThresholds`], not
//! protocol constants.

use crate::config::QualityThresholds;

/// Lexical statistics over a document's extracted text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    /// Total characters, including whitespace.
    pub total_chars: usize,
    /// Fraction of characters that are whitespace.
    pub whitespace_ratio: f64,
    /// Fraction of characters that are control characters (tab/newline
    /// excluded).
    pub non_printable_ratio: f64,
    /// Non-whitespace characters per page.
    pub density: f64,
    /// Distinct characters over total characters, a cheap vocabulary proxy.
    pub unique_ratio: f64,
}

impl TextMetrics {
    /// Metrics for empty input; scores to zero confidence.
    pub fn empty() -> Self {
        Self {
            total_chars: 0,
            whitespace_ratio: 0.0,
            non_printable_ratio: 0.0,
            density: 0.0,
            unique_ratio: 0.0,
        }
    }
}

/// Metrics plus the confidence they scored.
#[derive(Debug, Clone, Copy)]
pub struct QualityReport {
    pub metrics: TextMetrics,
    pub confidence: f64,
}

/// Scores extracted text and decides whether OCR can be skipped.
#[derive(Debug, Clone)]
pub struct BornDigitalScorer {
    thresholds: QualityThresholds,
}

impl BornDigitalScorer {
    pub fn new(thresholds: QualityThresholds) -> Self {
        Self { thresholds }
    }

    /// Compute lexical statistics for `text` spread over `page_count` pages.
    pub fn analyze(&self, text: &str, page_count: u32) -> TextMetrics {
        let total_chars = text.chars().count();
        if total_chars == 0 {
            return TextMetrics::empty();
        }

        let mut whitespace = 0usize;
        let mut non_printable = 0usize;
        let mut seen = std::collections::HashSet::new();
        for ch in text.chars() {
            if ch.is_whitespace() {
                whitespace += 1;
            } else if ch.is_control() {
                // Tabs and newlines already counted as whitespace above;
                // what remains is NUL bytes, escapes and similar decode junk.
                non_printable += 1;
            }
            seen.insert(ch);
        }

        let total = total_chars as f64;
        let pages = page_count.max(1) as f64;
        TextMetrics {
            total_chars,
            whitespace_ratio: whitespace as f64 / total,
            non_printable_ratio: non_printable as f64 / total,
            density: (total_chars - whitespace) as f64 / pages,
            unique_ratio: seen.len() as f64 / total,
        }
    }

    /// Weighted confidence in [0.0, 1.0] that the text layer is usable.
    ///
    /// Density dominates: a page of real prose carries on the order of a
    /// thousand visible characters, while a scanned page's text layer is
    /// empty or near-empty. The remaining terms catch decode garbage that
    /// happens to be long (wrong whitespace shape, control characters,
    /// single-character repetition).
    pub fn score(&self, metrics: &TextMetrics) -> f64 {
        if metrics.total_chars == 0 {
            return 0.0;
        }
        let t = &self.thresholds;

        let density_score = clamp01(metrics.density / t.density_target);
        let whitespace_score = clamp01(
            1.0 - (metrics.whitespace_ratio - t.whitespace_ideal).abs() / t.whitespace_tolerance,
        );
        let printable_score =
            clamp01(1.0 - t.non_printable_penalty * metrics.non_printable_ratio);
        let variety_score = clamp01(metrics.unique_ratio / t.variety_target);

        clamp01(
            t.density_weight * density_score
                + t.whitespace_weight * whitespace_score
                + t.printable_weight * printable_score
                + t.variety_weight * variety_score,
        )
    }

    /// Analyze and score in one call.
    pub fn assess(&self, text: &str, page_count: u32) -> QualityReport {
        let metrics = self.analyze(text, page_count);
        QualityReport {
            confidence: self.score(&metrics),
            metrics,
        }
    }

    /// True when `confidence` clears the direct-extraction threshold.
    pub fn is_direct_preferred(&self, confidence: f64) -> bool {
        confidence >= self.thresholds.direct_threshold
    }
}

impl Default for BornDigitalScorer {
    fn default() -> Self {
        Self::new(QualityThresholds::default())
    }
}

fn clamp01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}
