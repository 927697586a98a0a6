//! Whole-page OCR for scanned or image-only documents.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::RasterConfig;
use crate::ocr::{optimize_for_ocr, OcrEngine};

use super::assemble::{words_to_boxes, PageDraft};
use super::source::PageSource;

pub struct FullPageOcrFallback {
    engine: Arc<dyn OcrEngine>,
    raster: RasterConfig,
    /// Words below this engine confidence (0..=100) are dropped.
    min_word_confidence: f64,
}

impl FullPageOcrFallback {
    pub fn new(engine: Arc<dyn OcrEngine>, raster: RasterConfig, min_word_confidence: f64) -> Self {
        Self {
            engine,
            raster,
            min_word_confidence,
        }
    }

    /// OCR every page of the source up to the configured page cap. Pages
    /// whose rasterization or recognition fails are logged and omitted;
    /// the run itself never fails.
    pub fn run(&self, source: &dyn PageSource, language: &str) -> Vec<PageDraft> {
        let total = source.page_count();
        let limit = total.min(self.raster.max_pages);
        if limit < total {
            warn!(
                total,
                limit, "document exceeds the page cap, remaining pages skipped"
            );
        }

        let mut drafts = Vec::with_capacity(limit as usize);
        for page_number in 1..=limit {
            let started = Instant::now();
            let raster = match source.rasterize_page(page_number, self.raster.ocr_dpi) {
                Ok(raster) => raster,
                Err(e) => {
                    warn!(page = page_number, error = %e, "rasterization failed, page omitted");
                    continue;
                }
            };
            let prepared = optimize_for_ocr(&raster.image, self.raster.max_dimension);
            let output = match self.engine.recognize(&prepared, language) {
                Ok(output) => output,
                Err(e) => {
                    warn!(page = page_number, error = %e, "recognition failed, page omitted");
                    continue;
                }
            };

            // Boxes come back in the prepared image's space; express them in
            // the raster's.
            let scale_x = f64::from(raster.width()) / f64::from(prepared.width());
            let scale_y = f64::from(raster.height()) / f64::from(prepared.height());
            let boxes = words_to_boxes(
                &output.words,
                self.min_word_confidence,
                scale_x,
                scale_y,
                0,
            );

            debug!(
                page = page_number,
                confidence = output.confidence,
                words = output.words.len(),
                "page recognized"
            );
            drafts.push(PageDraft {
                page_number,
                text: output.text,
                confidence: (output.confidence / 100.0).clamp(0.0, 1.0),
                boxes,
                width: f64::from(raster.width()),
                height: f64::from(raster.height()),
                dpi: raster.dpi,
                processing_time_ms: started.elapsed().as_millis() as u64,
            });
        }
        drafts
    }
}
