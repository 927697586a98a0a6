//! PDF access: document loading, content-stream parsing, and the affine
//! geometry used to map content coordinates into page-pixel space.

mod content;
mod document;
mod geometry;
mod matrix;

pub use content::{PageContent, PageOperator, TextRun};
pub use document::{PdfDocument, PdfError, RasterizedPage};
pub use geometry::{GeometricExtractor, PageGeometry};
pub use matrix::{Matrix, Viewport};
