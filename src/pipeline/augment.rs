//! Selective OCR over the image regions of born-digital pages.
//!
//! Pages that extract directly can still carry scanned figures, stamps, or
//! embedded photographs. Instead of re-reading the whole page, only the
//! reported image regions are cropped out of one raster and recognized.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::RasterConfig;
use crate::models::BoundingBox;
use crate::ocr::{optimize_for_ocr, OcrEngine};
use crate::pdf::{RasterizedPage, Viewport};

use super::assemble::words_to_boxes;

/// Text recovered from the image regions of one page.
#[derive(Debug, Default)]
pub struct RegionAugmentation {
    /// One fragment per region that produced text, in region order.
    pub fragments: Vec<String>,
    /// Word boxes mapped back into page space.
    pub word_boxes: Vec<BoundingBox>,
    pub regions_recognized: usize,
}

impl RegionAugmentation {
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn merged_text(&self) -> String {
        self.fragments.join("\n")
    }
}

pub struct SelectiveOcrAugmenter {
    engine: Arc<dyn OcrEngine>,
    raster: RasterConfig,
    /// Words below this engine confidence (0..=100) are dropped.
    min_word_confidence: f64,
}

impl SelectiveOcrAugmenter {
    pub fn new(engine: Arc<dyn OcrEngine>, raster: RasterConfig, min_word_confidence: f64) -> Self {
        Self {
            engine,
            raster,
            min_word_confidence,
        }
    }

    /// Recognize each image region of an already-rasterized page and map
    /// the results back into page space. A failed region is logged and
    /// skipped; it never fails the page.
    pub fn augment(
        &self,
        raster: &RasterizedPage,
        viewport: &Viewport,
        regions: &[BoundingBox],
        language: &str,
    ) -> RegionAugmentation {
        let mut out = RegionAugmentation::default();
        if viewport.width <= 0.0 || viewport.height <= 0.0 {
            return out;
        }
        let raster_w = f64::from(raster.width());
        let raster_h = f64::from(raster.height());
        let scale_x = raster_w / viewport.width;
        let scale_y = raster_h / viewport.height;
        let min_px = f64::from(self.raster.min_region_px);

        for (index, region) in regions.iter().enumerate() {
            let rx = region.x * scale_x;
            let ry = region.y * scale_y;
            let rw = region.width * scale_x;
            let rh = region.height * scale_y;
            if rw < min_px || rh < min_px {
                debug!(
                    region = index,
                    width = rw,
                    height = rh,
                    "image region below recognition size, skipped"
                );
                continue;
            }

            let x0 = rx.clamp(0.0, raster_w).floor() as u32;
            let y0 = ry.clamp(0.0, raster_h).floor() as u32;
            let x1 = (rx + rw).clamp(0.0, raster_w).ceil() as u32;
            let y1 = (ry + rh).clamp(0.0, raster_h).ceil() as u32;
            if x1 <= x0 || y1 <= y0 {
                continue;
            }

            let crop = raster.image.crop_imm(x0, y0, x1 - x0, y1 - y0);
            let prepared = optimize_for_ocr(&crop, self.raster.max_dimension);
            let output = match self.engine.recognize(&prepared, language) {
                Ok(output) => output,
                Err(e) => {
                    warn!(region = index, error = %e, "region recognition failed, skipped");
                    continue;
                }
            };
            if output.is_empty() {
                debug!(region = index, "image region produced no text");
                continue;
            }

            // Word coordinates come back in the prepared image's space.
            // Undo the preprocessing resize, shift by the crop offset, then
            // scale from raster pixels back to page space.
            let back_x = f64::from(crop.width()) / f64::from(prepared.width());
            let back_y = f64::from(crop.height()) / f64::from(prepared.height());
            let mut words = words_to_boxes(
                &output.words,
                self.min_word_confidence,
                back_x,
                back_y,
                viewport.rotation,
            );
            for word in &mut words {
                word.translate(f64::from(x0), f64::from(y0));
                word.scale(1.0 / scale_x, 1.0 / scale_y);
            }
            out.word_boxes.extend(words);
            out.fragments.push(output.text.trim().to_string());
            out.regions_recognized += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use image::DynamicImage;

    use super::*;
    use crate::ocr::{OcrError, OcrOutput, OcrWord};

    struct ScriptedEngine {
        outputs: Mutex<VecDeque<Result<OcrOutput, OcrError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedEngine {
        fn new(outputs: Vec<Result<OcrOutput, OcrError>>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl OcrEngine for ScriptedEngine {
        fn engine_name(&self) -> &'static str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        fn recognize(&self, _image: &DynamicImage, _language: &str) -> Result<OcrOutput, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outputs
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(OcrOutput::default()))
        }
    }

    fn word(text: &str, confidence: f64, x: f64, y: f64, w: f64, h: f64) -> OcrWord {
        OcrWord {
            text: text.into(),
            confidence,
            x,
            y,
            width: w,
            height: h,
        }
    }

    fn output(text: &str, words: Vec<OcrWord>) -> OcrOutput {
        OcrOutput {
            text: text.into(),
            confidence: 90.0,
            words,
            processing_time_ms: 1,
        }
    }

    fn raster(width: u32, height: u32) -> RasterizedPage {
        RasterizedPage {
            image: DynamicImage::new_rgb8(width, height),
            dpi: 150,
        }
    }

    fn augmenter(engine: Arc<ScriptedEngine>, min_word_confidence: f64) -> SelectiveOcrAugmenter {
        SelectiveOcrAugmenter::new(engine, RasterConfig::default(), min_word_confidence)
    }

    #[test]
    fn test_words_map_back_to_page_space() {
        // Page is 300x300, raster 600x600, so page->raster scale is 2. The
        // crop is 400x400, large enough that preprocessing keeps its size.
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(output(
            "figure caption",
            vec![word("caption", 95.0, 30.0, 40.0, 50.0, 60.0)],
        ))]));
        let viewport = Viewport::identity(300.0, 300.0);
        let region = BoundingBox::from_rect(10.0, 10.0, 200.0, 200.0, String::new(), 0.0, 0);

        let out = augmenter(Arc::clone(&engine), 0.0).augment(
            &raster(600, 600),
            &viewport,
            &[region],
            "eng",
        );

        assert_eq!(out.regions_recognized, 1);
        assert_eq!(out.fragments, vec!["figure caption".to_string()]);
        assert_eq!(out.word_boxes.len(), 1);
        let b = &out.word_boxes[0];
        // (30,40) in the crop -> (50,60) in the raster -> (25,30) on the page.
        assert!((b.x - 25.0).abs() < 1e-9);
        assert!((b.y - 30.0).abs() < 1e-9);
        assert!((b.width - 25.0).abs() < 1e-9);
        assert!((b.height - 30.0).abs() < 1e-9);
        assert!((b.confidence - 0.95).abs() < 1e-9);
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_tiny_regions_skip_recognition() {
        let engine = Arc::new(ScriptedEngine::new(vec![]));
        let viewport = Viewport::identity(100.0, 100.0);
        // 2x2 page units -> 4x4 raster px, below the 8 px floor.
        let region = BoundingBox::from_rect(10.0, 10.0, 2.0, 2.0, String::new(), 0.0, 0);

        let out = augmenter(Arc::clone(&engine), 0.0).augment(
            &raster(200, 200),
            &viewport,
            &[region],
            "eng",
        );

        assert!(out.is_empty());
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn test_region_failure_does_not_poison_the_rest() {
        let engine = Arc::new(ScriptedEngine::new(vec![
            Err(OcrError::Failed("engine crashed".into())),
            Ok(output("second region", vec![])),
        ]));
        let viewport = Viewport::identity(300.0, 300.0);
        let regions = vec![
            BoundingBox::from_rect(0.0, 0.0, 140.0, 140.0, String::new(), 0.0, 0),
            BoundingBox::from_rect(150.0, 150.0, 140.0, 140.0, String::new(), 0.0, 0),
        ];

        let out = augmenter(Arc::clone(&engine), 0.0).augment(
            &raster(300, 300),
            &viewport,
            &regions,
            "eng",
        );

        assert_eq!(out.regions_recognized, 1);
        assert_eq!(out.fragments, vec!["second region".to_string()]);
        assert_eq!(engine.calls(), 2);
    }

    #[test]
    fn test_empty_recognition_is_not_counted() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(output("   ", vec![]))]));
        let viewport = Viewport::identity(300.0, 300.0);
        let region = BoundingBox::from_rect(0.0, 0.0, 200.0, 200.0, String::new(), 0.0, 0);

        let out = augmenter(engine, 0.0).augment(&raster(300, 300), &viewport, &[region], "eng");

        assert!(out.is_empty());
        assert_eq!(out.regions_recognized, 0);
    }

    #[test]
    fn test_low_confidence_words_dropped_but_text_kept() {
        let engine = Arc::new(ScriptedEngine::new(vec![Ok(output(
            "smudged stamp",
            vec![word("smudged", 20.0, 0.0, 0.0, 10.0, 10.0)],
        ))]));
        let viewport = Viewport::identity(300.0, 300.0);
        let region = BoundingBox::from_rect(0.0, 0.0, 200.0, 200.0, String::new(), 0.0, 0);

        let out = augmenter(engine, 60.0).augment(&raster(300, 300), &viewport, &[region], "eng");

        assert_eq!(out.fragments, vec!["smudged stamp".to_string()]);
        assert!(out.word_boxes.is_empty());
    }
}
