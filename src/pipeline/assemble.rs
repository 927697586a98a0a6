//! Normalization of extraction-path output into canonical pages.

use crate::models::{BoundingBox, Page, PageMetadata};
use crate::ocr::OcrWord;

/// Per-page result of an extraction path, before normalization.
#[derive(Debug, Clone, Default)]
pub struct PageDraft {
    pub page_number: u32,
    pub text: String,
    /// 0..=1.
    pub confidence: f64,
    pub boxes: Vec<BoundingBox>,
    /// Page width in the space the boxes are expressed in.
    pub width: f64,
    pub height: f64,
    /// DPI of the raster used, 0 when nothing was rasterized.
    pub dpi: u32,
    pub processing_time_ms: u64,
}

/// Canonical pages plus the aggregate document confidence.
#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub pages: Vec<Page>,
    /// Mean page confidence; 0 when no pages survived extraction.
    pub confidence: f64,
}

/// Merges extraction output into canonical [`Page`]s. Both extraction
/// paths produce [`PageDraft`]s, so downstream consumers never see which
/// path ran.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageAssembler;

impl PageAssembler {
    pub fn assemble(&self, document_id: &str, mut drafts: Vec<PageDraft>) -> AssembledDocument {
        drafts.sort_by_key(|d| d.page_number);
        let pages: Vec<Page> = drafts
            .into_iter()
            .map(|draft| Page {
                document_id: document_id.to_string(),
                page_number: draft.page_number,
                text: draft.text,
                confidence: draft.confidence.clamp(0.0, 1.0),
                boxes: draft
                    .boxes
                    .into_iter()
                    .filter(|b| b.is_well_formed())
                    .collect(),
                metadata: PageMetadata {
                    width: draft.width,
                    height: draft.height,
                    dpi: draft.dpi,
                    processing_time_ms: draft.processing_time_ms,
                },
            })
            .collect();

        let confidence = if pages.is_empty() {
            0.0
        } else {
            pages.iter().map(|p| p.confidence).sum::<f64>() / pages.len() as f64
        };

        AssembledDocument { pages, confidence }
    }
}

/// Convert engine words into boxes, dropping words below the confidence
/// floor and scaling from recognition space into page space.
pub fn words_to_boxes(
    words: &[OcrWord],
    min_confidence: f64,
    scale_x: f64,
    scale_y: f64,
    rotation: i32,
) -> Vec<BoundingBox> {
    words
        .iter()
        .filter(|w| w.confidence >= min_confidence)
        .map(|w| {
            let mut b = BoundingBox::from_rect(
                w.x,
                w.y,
                w.width,
                w.height,
                w.text.clone(),
                w.confidence / 100.0,
                rotation,
            );
            b.scale(scale_x, scale_y);
            b
        })
        .collect()
}
