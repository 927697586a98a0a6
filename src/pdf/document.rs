//! PDF document access.
//!
//! Structure (page tree, media boxes, content streams) is read with lopdf.
//! Text extraction and rasterization shell out to poppler-utils, which
//! handle font encodings and rendering far better than anything worth
//! reimplementing here.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use lopdf::{Document, Object, ObjectId};
use tempfile::TempDir;
use thiserror::Error;

use crate::utils::cmd::{capture_stdout, expect_success, CommandError};

use super::content::{self, PageContent};
use super::matrix::Viewport;

/// Errors from PDF structure access or the poppler tools.
#[derive(Debug, Error)]
pub enum PdfError {
    #[error("pdf parse error: {0}")]
    Parse(#[from] lopdf::Error),

    #[error("page {0} not found")]
    PageNotFound(u32),

    #[error(transparent)]
    Command(#[from] CommandError),

    #[error("raster decode failed: {0}")]
    Raster(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A page rendered to pixels.
pub struct RasterizedPage {
    pub image: image::DynamicImage,
    pub dpi: u32,
}

impl RasterizedPage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// An opened PDF. Keeps the source path because the poppler tools operate
/// on files, not bytes.
pub struct PdfDocument {
    doc: Document,
    path: PathBuf,
    pages: BTreeMap<u32, ObjectId>,
}

impl PdfDocument {
    pub fn open(path: &Path) -> Result<Self, PdfError> {
        let doc = Document::load(path)?;
        let pages = doc.get_pages();
        Ok(Self {
            doc,
            path: path.to_path_buf(),
            pages,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page numbers in document order (1-based).
    pub fn page_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.pages.keys().copied()
    }

    /// The pixel-space viewport for a page at the given scale.
    pub fn viewport(&self, page_number: u32, scale: f64) -> Result<Viewport, PdfError> {
        let page_id = self.page_id(page_number)?;
        Ok(Viewport::from_page(
            self.media_box(page_id),
            self.page_rotation(page_id),
            scale,
        ))
    }

    /// Typed operators and recovered text runs for a page.
    pub fn page_content(&self, page_number: u32) -> Result<PageContent, PdfError> {
        let page_id = self.page_id(page_number)?;
        content::parse_page(&self.doc, page_id)
    }

    /// Extract one page of text with pdftotext.
    pub fn page_text(&self, page_number: u32) -> Result<String, PdfError> {
        let page = page_number.to_string();
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8", "-f", &page, "-l", &page])
            .arg(&self.path)
            .arg("-")
            .output();
        Ok(capture_stdout(
            output,
            "pdftotext (install poppler-utils)",
            &format!("pdftotext failed on page {}", page_number),
        )?)
    }

    /// Extract the whole document's text with pdftotext.
    pub fn full_text(&self) -> Result<String, PdfError> {
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8"])
            .arg(&self.path)
            .arg("-")
            .output();
        Ok(capture_stdout(
            output,
            "pdftotext (install poppler-utils)",
            "pdftotext failed",
        )?)
    }

    /// Render one page to pixels with pdftoppm.
    pub fn rasterize_page(&self, page_number: u32, dpi: u32) -> Result<RasterizedPage, PdfError> {
        let temp_dir = TempDir::new()?;
        let page = page_number.to_string();
        let status = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi.to_string(), "-f", &page, "-l", &page])
            .arg(&self.path)
            .arg(temp_dir.path().join("page"))
            .status();
        expect_success(
            status,
            "pdftoppm (install poppler-utils)",
            &format!("pdftoppm failed on page {}", page_number),
        )?;

        let image_path = find_page_image(temp_dir.path(), page_number).ok_or_else(|| {
            CommandError::Failed(format!("pdftoppm produced no raster for page {}", page_number))
        })?;
        let image = image::open(&image_path)?;
        Ok(RasterizedPage { image, dpi })
    }

    fn page_id(&self, page_number: u32) -> Result<ObjectId, PdfError> {
        self.pages
            .get(&page_number)
            .copied()
            .ok_or(PdfError::PageNotFound(page_number))
    }

    /// MediaBox as `[x0, y0, x1, y1]`, defaulting to US Letter when the
    /// entry is missing or malformed.
    fn media_box(&self, page_id: ObjectId) -> [f64; 4] {
        let fallback = [0.0, 0.0, 612.0, 792.0];
        let Some(Object::Array(values)) =
            content::inherited_page_entry(&self.doc, page_id, b"MediaBox")
        else {
            return fallback;
        };
        let numbers: Vec<f64> = values
            .iter()
            .filter_map(|v| match v {
                Object::Integer(i) => Some(*i as f64),
                Object::Real(r) => Some(*r as f64),
                _ => None,
            })
            .collect();
        match numbers.as_slice() {
            [x0, y0, x1, y1] => [*x0, *y0, *x1, *y1],
            _ => fallback,
        }
    }

    fn page_rotation(&self, page_id: ObjectId) -> i32 {
        match content::inherited_page_entry(&self.doc, page_id, b"Rotate") {
            Some(Object::Integer(deg)) => *deg as i32,
            _ => 0,
        }
    }
}

/// Locate the single png pdftoppm wrote. The page-number padding in the
/// filename depends on the document's total page count, so probe common
/// widths and fall back to a directory scan.
fn find_page_image(dir: &Path, page_number: u32) -> Option<PathBuf> {
    for digits in 1..=4 {
        let candidate = dir.join(format!("page-{:0width$}.png", page_number, width = digits));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    let mut pngs: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "png").unwrap_or(false))
        .collect();
    pngs.sort();
    pngs.into_iter().next()
}
