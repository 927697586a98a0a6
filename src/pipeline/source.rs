use std::path::Path;

use crate::pdf::{PageContent, PdfDocument, PdfError, RasterizedPage, Viewport};

/// Page-level access to an opened document, as the extraction paths
/// consume it. `PdfDocument` is the production implementation; tests
/// substitute scripted sources so the pipeline can run without the
/// poppler tools installed.
///
/// Page numbers are 1-based and contiguous up to `page_count`.
pub trait PageSource {
    fn page_count(&self) -> u32;

    /// Text layer of one page, in reading order.
    fn page_text(&self, page_number: u32) -> Result<String, PdfError>;

    /// Text of the whole document, pages separated by form feeds.
    fn full_text(&self) -> Result<String, PdfError> {
        let mut text = String::new();
        for page_number in 1..=self.page_count() {
            if page_number > 1 {
                text.push('\u{c}');
            }
            text.push_str(&self.page_text(page_number)?);
        }
        Ok(text)
    }

    fn viewport(&self, page_number: u32, scale: f64) -> Result<Viewport, PdfError>;

    fn page_content(&self, page_number: u32) -> Result<PageContent, PdfError>;

    fn rasterize_page(&self, page_number: u32, dpi: u32) -> Result<RasterizedPage, PdfError>;
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> u32 {
        PdfDocument::page_count(self)
    }

    fn page_text(&self, page_number: u32) -> Result<String, PdfError> {
        PdfDocument::page_text(self, page_number)
    }

    fn full_text(&self) -> Result<String, PdfError> {
        PdfDocument::full_text(self)
    }

    fn viewport(&self, page_number: u32, scale: f64) -> Result<Viewport, PdfError> {
        PdfDocument::viewport(self, page_number, scale)
    }

    fn page_content(&self, page_number: u32) -> Result<PageContent, PdfError> {
        PdfDocument::page_content(self, page_number)
    }

    fn rasterize_page(&self, page_number: u32, dpi: u32) -> Result<RasterizedPage, PdfError> {
        PdfDocument::rasterize_page(self, page_number, dpi)
    }
}

/// Opens a stored blob into a [`PageSource`].
pub trait DocumentOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>, PdfError>;
}

/// Production opener backed by lopdf.
#[derive(Debug, Default)]
pub struct PdfOpener;

impl DocumentOpener for PdfOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn PageSource>, PdfError> {
        Ok(Box::new(PdfDocument::open(path)?))
    }
}
