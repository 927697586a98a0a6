//! Region geometry in page-pixel space.
//!
//! Replays a page's typed operator list through a matrix-stack VM to place
//! embedded images, and maps recovered text runs the same way. Every box
//! that comes out of here is in the viewport's pixel space, top-left
//! origin, whichever extractor produced it.

use crate::models::{BoundingBox, Point};

use super::content::{PageContent, PageOperator};
use super::matrix::{Matrix, Viewport};

/// Text and image-region boxes for one page, plus the pixel dimensions of
/// the space they are expressed in.
#[derive(Debug, Clone, Default)]
pub struct PageGeometry {
    pub text_boxes: Vec<BoundingBox>,
    pub image_boxes: Vec<BoundingBox>,
    pub width: f64,
    pub height: f64,
}

impl PageGeometry {
    pub fn has_image_regions(&self) -> bool {
        !self.image_boxes.is_empty()
    }
}

/// Maps content-space geometry into pixel space.
#[derive(Debug, Clone)]
pub struct GeometricExtractor {
    /// Boxes thinner than this in either dimension are dropped.
    epsilon: f64,
}

impl GeometricExtractor {
    pub fn new(epsilon: f64) -> Self {
        Self { epsilon }
    }

    /// Extract text and image-region boxes for one page.
    pub fn extract(&self, viewport: &Viewport, content: &PageContent) -> PageGeometry {
        let mut image_boxes = Vec::new();
        let mut ctm = Matrix::IDENTITY;
        let mut stack: Vec<Matrix> = Vec::new();

        for op in &content.operators {
            match op {
                PageOperator::Save => stack.push(ctm),
                PageOperator::Restore => {
                    if let Some(previous) = stack.pop() {
                        ctm = previous;
                    }
                }
                PageOperator::Transform(m) => ctm = ctm.compose(m),
                PageOperator::PaintImage { .. } => {
                    // An image paints the unit square under the current
                    // transform.
                    let device = viewport.transform.compose(&ctm);
                    if let Some(b) =
                        self.mapped_box(&device, 1.0, 1.0, String::new(), 0.0, viewport.rotation)
                    {
                        image_boxes.push(b);
                    }
                }
            }
        }

        let text_boxes = content
            .text_runs
            .iter()
            .filter_map(|run| {
                let device = viewport.transform.compose(&run.transform);
                self.mapped_box(
                    &device,
                    run.width,
                    run.height,
                    run.text.clone(),
                    1.0,
                    viewport.rotation,
                )
            })
            .collect();

        PageGeometry {
            text_boxes,
            image_boxes,
            width: viewport.width,
            height: viewport.height,
        }
    }

    /// Map the rectangle (0,0)..(w,h) through `device` and envelope the
    /// resulting quadrilateral. Degenerate results are dropped.
    fn mapped_box(
        &self,
        device: &Matrix,
        width: f64,
        height: f64,
        text: String,
        confidence: f64,
        rotation: i32,
    ) -> Option<BoundingBox> {
        let corners = [
            (0.0, 0.0),
            (width, 0.0),
            (width, height),
            (0.0, height),
        ]
        .map(|(x, y)| {
            let (px, py) = device.apply(x, y);
            Point::new(px, py)
        });
        let bounds = BoundingBox::from_quad(corners, text, confidence, rotation);
        bounds.exceeds(self.epsilon).then_some(bounds)
    }
}

impl Default for GeometricExtractor {
    fn default() -> Self {
        Self::new(0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::content::TextRun;

    fn extractor() -> GeometricExtractor {
        GeometricExtractor::new(0.5)
    }

    #[test]
    fn test_unit_square_under_translation() {
        let content = PageContent {
            operators: vec![
                PageOperator::Save,
                PageOperator::Transform(Matrix::translation(10.0, 20.0)),
                PageOperator::PaintImage {
                    name: "Im1".to_string(),
                },
                PageOperator::Restore,
            ],
            text_runs: vec![],
        };
        let geometry = extractor().extract(&Viewport::identity(100.0, 100.0), &content);

        assert_eq!(geometry.image_boxes.len(), 1);
        let b = &geometry.image_boxes[0];
        assert_eq!((b.x, b.y, b.width, b.height), (10.0, 20.0, 1.0, 1.0));
        let expected = [
            Point::new(10.0, 20.0),
            Point::new(11.0, 20.0),
            Point::new(11.0, 21.0),
            Point::new(10.0, 21.0),
        ];
        assert_eq!(b.polygon, expected);
    }

    #[test]
    fn test_rotated_viewport_swaps_box_dimensions() {
        let run = TextRun {
            text: "wide".to_string(),
            transform: Matrix::IDENTITY,
            width: 10.0,
            height: 2.0,
        };
        let content = PageContent {
            operators: vec![],
            text_runs: vec![run],
        };
        let viewport = Viewport::from_page([0.0, 0.0, 100.0, 200.0], 90, 1.0);
        let geometry = extractor().extract(&viewport, &content);

        assert_eq!(geometry.text_boxes.len(), 1);
        let b = &geometry.text_boxes[0];
        assert_eq!((b.width, b.height), (2.0, 10.0));
        assert_eq!(b.rotation, 90);
    }

    #[test]
    fn test_y_flip_puts_text_boxes_in_top_left_space() {
        // A run near the top of a letter-sized page (content y = 700)
        // should land near pixel y = 0, not y = 700.
        let run = TextRun {
            text: "header".to_string(),
            transform: Matrix::translation(100.0, 700.0),
            width: 30.0,
            height: 12.0,
        };
        let content = PageContent {
            operators: vec![],
            text_runs: vec![run],
        };
        let viewport = Viewport::from_page([0.0, 0.0, 612.0, 792.0], 0, 1.0);
        let geometry = extractor().extract(&viewport, &content);

        let b = &geometry.text_boxes[0];
        assert_eq!(b.x, 100.0);
        assert_eq!(b.y, 792.0 - 700.0 - 12.0);
        assert_eq!((b.width, b.height), (30.0, 12.0));
    }

    #[test]
    fn test_degenerate_boxes_filtered() {
        let content = PageContent {
            operators: vec![
                // zero-width image placement
                PageOperator::Transform(Matrix::scaling(0.0, 50.0)),
                PageOperator::PaintImage {
                    name: "Im1".to_string(),
                },
            ],
            text_runs: vec![TextRun {
                text: "sliver".to_string(),
                transform: Matrix::scaling(0.1, 0.1),
                width: 1.0,
                height: 1.0,
            }],
        };
        let geometry = extractor().extract(&Viewport::identity(100.0, 100.0), &content);
        assert!(geometry.image_boxes.is_empty());
        assert!(geometry.text_boxes.is_empty());
    }

    #[test]
    fn test_restore_unwinds_nested_transforms() {
        let content = PageContent {
            operators: vec![
                PageOperator::Save,
                PageOperator::Transform(Matrix::translation(50.0, 50.0)),
                PageOperator::Restore,
                // placed at the origin scale, unaffected by the popped translate
                PageOperator::Transform(Matrix::scaling(4.0, 4.0)),
                PageOperator::PaintImage {
                    name: "Im1".to_string(),
                },
            ],
            text_runs: vec![],
        };
        let geometry = extractor().extract(&Viewport::identity(100.0, 100.0), &content);
        let b = &geometry.image_boxes[0];
        assert_eq!((b.x, b.y, b.width, b.height), (0.0, 0.0, 4.0, 4.0));
    }

    #[test]
    fn test_reports_viewport_dimensions() {
        let geometry = extractor().extract(
            &Viewport::identity(320.0, 240.0),
            &PageContent::default(),
        );
        assert_eq!((geometry.width, geometry.height), (320.0, 240.0));
    }
}
