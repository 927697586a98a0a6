//! Page results and bounding-box geometry.
//!
//! Every box is expressed in page-pixel space (the viewport at scale 1.0)
//! regardless of whether it came from the geometric extractor or from OCR.

use serde::{Deserialize, Serialize};

/// A point in page-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box with the source quadrilateral retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Text carried by this region (may be empty for image regions).
    pub text: String,
    /// Confidence in 0..=1.
    pub confidence: f64,
    /// The mapped quadrilateral the AABB was derived from.
    pub polygon: [Point; 4],
    /// Page rotation in degrees at extraction time.
    pub rotation: i32,
}

impl BoundingBox {
    /// Build a box from an axis-aligned rectangle.
    pub fn from_rect(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        text: String,
        confidence: f64,
        rotation: i32,
    ) -> Self {
        let polygon = [
            Point::new(x, y),
            Point::new(x + width, y),
            Point::new(x + width, y + height),
            Point::new(x, y + height),
        ];
        Self {
            x,
            y,
            width,
            height,
            text,
            confidence,
            polygon,
            rotation,
        }
    }

    /// Build a box as the axis-aligned envelope of a mapped quadrilateral.
    pub fn from_quad(corners: [Point; 4], text: String, confidence: f64, rotation: i32) -> Self {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for p in &corners {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
            text,
            confidence,
            polygon: corners,
            rotation,
        }
    }

    /// True when both dimensions are finite and at least `epsilon` wide.
    pub fn exceeds(&self, epsilon: f64) -> bool {
        self.width.is_finite()
            && self.height.is_finite()
            && self.width >= epsilon
            && self.height >= epsilon
    }

    /// True when the box has finite, strictly positive dimensions and a
    /// finite origin. Assembly drops everything else.
    pub fn is_well_formed(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width > 0.0
            && self.height > 0.0
    }

    /// Shift the box (and its polygon) by an offset.
    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        for p in &mut self.polygon {
            p.x += dx;
            p.y += dy;
        }
    }

    /// Scale the box (and its polygon) around the origin.
    pub fn scale(&mut self, sx: f64, sy: f64) {
        self.x *= sx;
        self.y *= sy;
        self.width *= sx;
        self.height *= sy;
        for p in &mut self.polygon {
            p.x *= sx;
            p.y *= sy;
        }
    }
}

/// Per-page extraction metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    /// Page width in page pixels.
    pub width: f64,
    /// Page height in page pixels.
    pub height: f64,
    /// DPI of the raster used for OCR, if any.
    pub dpi: u32,
    /// Wall-clock time spent on this page.
    pub processing_time_ms: u64,
}

/// Canonical per-page processing result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Owning document.
    pub document_id: String,
    /// 1-based page number, unique within the document.
    pub page_number: u32,
    /// Extracted text for the page.
    pub text: String,
    /// Confidence in 0..=1 that the text is usable.
    pub confidence: f64,
    /// Ordered region boxes.
    pub boxes: Vec<BoundingBox>,
    pub metadata: PageMetadata,
}
