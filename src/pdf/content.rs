//! Typed view of a page's content stream.
//!
//! The raw stream is a sequence of loosely-typed operations. Everything the
//! geometry pass needs is validated here, once, into two shapes: a tagged
//! operator list covering the graphics state and image placements, and a
//! recovered text-run list with resolved content-space transforms. Unknown
//! or malformed operations are skipped, never propagated.

use std::collections::HashSet;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId};

use super::document::PdfError;
use super::matrix::Matrix;

/// Graphics operations relevant to region geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOperator {
    /// `q`: push the current transform.
    Save,
    /// `Q`: pop the transform stack.
    Restore,
    /// `cm`: concatenate a matrix onto the current transform.
    Transform(Matrix),
    /// `Do` on an image XObject, or an inline image. Paints the unit
    /// square under the current transform.
    PaintImage { name: String },
}

/// A run of shown text with its full content-space transform.
///
/// Width is an approximation (half an em per character at the active font
/// size); real glyph metrics would need font programs, and approximate
/// region geometry is all downstream consumers use.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub transform: Matrix,
    pub width: f64,
    pub height: f64,
}

/// Parsed page content: operators for the geometry VM plus recovered runs.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub operators: Vec<PageOperator>,
    pub text_runs: Vec<TextRun>,
}

/// Average glyph advance as a fraction of the font size.
const EM_ADVANCE: f64 = 0.5;

/// Decode and interpret a page's content stream.
pub fn parse_page(doc: &Document, page_id: ObjectId) -> Result<PageContent, PdfError> {
    let data = doc.get_page_content(page_id)?;
    let content = Content::decode(&data)?;
    let image_names = image_xobject_names(doc, page_id);
    Ok(from_operations(&content.operations, &image_names))
}

/// Interpreter state for text positioning.
struct TextState {
    text_matrix: Matrix,
    line_matrix: Matrix,
    leading: f64,
    font_size: f64,
}

impl TextState {
    fn new() -> Self {
        Self {
            text_matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            leading: 0.0,
            font_size: 0.0,
        }
    }

    fn begin_text(&mut self) {
        self.text_matrix = Matrix::IDENTITY;
        self.line_matrix = Matrix::IDENTITY;
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = self.line_matrix.compose(&Matrix::translation(tx, ty));
        self.text_matrix = self.line_matrix;
    }

    fn advance(&mut self, tx: f64) {
        self.text_matrix = self.text_matrix.compose(&Matrix::translation(tx, 0.0));
    }
}

/// Translate decoded operations into the typed shapes.
pub fn from_operations(
    operations: &[Operation],
    image_names: &HashSet<Vec<u8>>,
) -> PageContent {
    let mut content = PageContent::default();
    let mut ctm = Matrix::IDENTITY;
    let mut stack: Vec<Matrix> = Vec::new();
    let mut text = TextState::new();

    for op in operations {
        match op.operator.as_str() {
            "q" => {
                stack.push(ctm);
                content.operators.push(PageOperator::Save);
            }
            "Q" => {
                if let Some(previous) = stack.pop() {
                    ctm = previous;
                }
                content.operators.push(PageOperator::Restore);
            }
            "cm" => {
                if let Some(m) = matrix_operands(&op.operands) {
                    ctm = ctm.compose(&m);
                    content.operators.push(PageOperator::Transform(m));
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    if image_names.contains(name) {
                        content.operators.push(PageOperator::PaintImage {
                            name: String::from_utf8_lossy(name).into_owned(),
                        });
                    }
                }
            }
            "BI" => {
                content.operators.push(PageOperator::PaintImage {
                    name: "inline".to_string(),
                });
            }
            "BT" => text.begin_text(),
            "ET" => {}
            "Tf" => {
                if let Some(size) = op.operands.get(1).and_then(number) {
                    text.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = op.operands.first().and_then(number) {
                    text.leading = leading;
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operands(&op.operands) {
                    text.text_matrix = m;
                    text.line_matrix = m;
                }
            }
            "Td" => {
                if let (Some(tx), Some(ty)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    text.next_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (
                    op.operands.first().and_then(number),
                    op.operands.get(1).and_then(number),
                ) {
                    text.leading = -ty;
                    text.next_line(tx, ty);
                }
            }
            "T*" => text.next_line(0.0, -text.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    show_text(&mut content, &mut text, &ctm, bytes);
                }
            }
            "'" => {
                text.next_line(0.0, -text.leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    show_text(&mut content, &mut text, &ctm, bytes);
                }
            }
            "\"" => {
                // word/char spacing operands are ignored for box purposes
                text.next_line(0.0, -text.leading);
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    show_text(&mut content, &mut text, &ctm, bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(elements)) = op.operands.first() {
                    for element in elements {
                        match element {
                            Object::String(bytes, _) => {
                                show_text(&mut content, &mut text, &ctm, bytes);
                            }
                            other => {
                                if let Some(adjustment) = number(other) {
                                    text.advance(-adjustment / 1000.0 * text.font_size);
                                }
                            }
                        }
                    }
                }
            }
            _ => {}
        }
    }

    content
}

fn show_text(content: &mut PageContent, state: &mut TextState, ctm: &Matrix, bytes: &[u8]) {
    let decoded = decode_string_bytes(bytes);
    let glyphs = decoded.chars().count();
    let width = glyphs as f64 * EM_ADVANCE * state.font_size;
    if !decoded.trim().is_empty() && state.font_size > 0.0 {
        content.text_runs.push(TextRun {
            text: decoded,
            transform: ctm.compose(&state.text_matrix),
            width,
            height: state.font_size,
        });
    }
    state.advance(width);
}

/// Best-effort decode of a PDF string. Simple Latin encodings map through
/// directly and UTF-16BE is decoded; anything else (CID codes without a
/// font map) is dropped rather than emitted as garbage.
fn decode_string_bytes(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes
        .iter()
        .filter_map(|&b| match b {
            b' '..=b'~' => Some(b as char),
            0xA0..=0xFF => char::from_u32(b as u32),
            b'\n' | b'\r' | b'\t' => Some(' '),
            _ => None,
        })
        .collect()
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn matrix_operands(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut values = [0.0f64; 6];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(Matrix::from(values))
}

/// Collect the names of image XObjects reachable from a page's resources,
/// walking up the page tree when resources are inherited.
pub fn image_xobject_names(doc: &Document, page_id: ObjectId) -> HashSet<Vec<u8>> {
    let mut names = HashSet::new();
    let Some(resources) = page_resources(doc, page_id) else {
        return names;
    };
    let Some(Object::Dictionary(xobjects)) =
        resources.get(b"XObject").ok().map(|o| resolve(doc, o))
    else {
        return names;
    };
    for (name, value) in xobjects.iter() {
        if let Object::Stream(stream) = resolve(doc, value) {
            let is_image = matches!(
                stream.dict.get(b"Subtype"),
                Ok(Object::Name(subtype)) if subtype == b"Image"
            );
            if is_image {
                names.insert(name.clone());
            }
        }
    }
    names
}

fn page_resources<'a>(doc: &'a Document, page_id: ObjectId) -> Option<&'a lopdf::Dictionary> {
    match inherited_page_entry(doc, page_id, b"Resources") {
        Some(Object::Dictionary(resources)) => Some(resources),
        _ => None,
    }
}

/// Look up a page attribute, walking up the page tree for inheritable
/// entries (`MediaBox`, `Rotate`, `Resources`). Depth-capped against
/// malformed parent cycles.
pub(crate) fn inherited_page_entry<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..16 {
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        match dict.get(b"Parent") {
            Ok(Object::Reference(parent)) => {
                dict = doc.get_object(*parent).ok()?.as_dict().ok()?;
            }
            _ => break,
        }
    }
    None
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    if let Object::Reference(id) = obj {
        doc.get_object(*id).unwrap_or(obj)
    } else {
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operator: &str, operands: Vec<Object>) -> Operation {
        Operation::new(operator, operands)
    }

    fn name(n: &[u8]) -> Object {
        Object::Name(n.to_vec())
    }

    fn real(v: f32) -> Object {
        Object::Real(v)
    }

    fn image_set(names: &[&[u8]]) -> HashSet<Vec<u8>> {
        names.iter().map(|n| n.to_vec()).collect()
    }

    #[test]
    fn test_graphics_operators_translate_to_tagged_variants() {
        let ops = vec![
            op("q", vec![]),
            op(
                "cm",
                vec![
                    real(1.0),
                    real(0.0),
                    real(0.0),
                    real(1.0),
                    real(10.0),
                    real(20.0),
                ],
            ),
            op("Do", vec![name(b"Im1")]),
            op("Q", vec![]),
        ];
        let content = from_operations(&ops, &image_set(&[b"Im1"]));
        assert_eq!(
            content.operators,
            vec![
                PageOperator::Save,
                PageOperator::Transform(Matrix::translation(10.0, 20.0)),
                PageOperator::PaintImage {
                    name: "Im1".to_string()
                },
                PageOperator::Restore,
            ]
        );
    }

    #[test]
    fn test_non_image_xobjects_are_not_paint_ops() {
        let ops = vec![op("Do", vec![name(b"Fm0")]), op("Do", vec![name(b"Im1")])];
        let content = from_operations(&ops, &image_set(&[b"Im1"]));
        assert_eq!(content.operators.len(), 1);
    }

    #[test]
    fn test_simple_text_run_recovery() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name(b"F1"), real(12.0)]),
            op(
                "Tm",
                vec![
                    real(1.0),
                    real(0.0),
                    real(0.0),
                    real(1.0),
                    real(100.0),
                    real(700.0),
                ],
            ),
            op("Tj", vec![Object::string_literal("Hello")]),
            op("ET", vec![]),
        ];
        let content = from_operations(&ops, &HashSet::new());
        assert_eq!(content.text_runs.len(), 1);
        let run = &content.text_runs[0];
        assert_eq!(run.text, "Hello");
        assert_eq!(run.height, 12.0);
        assert_eq!(run.width, 5.0 * 0.5 * 12.0);
        assert_eq!(run.transform.apply(0.0, 0.0), (100.0, 700.0));
    }

    #[test]
    fn test_consecutive_shows_advance_along_the_line() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name(b"F1"), real(10.0)]),
            op("Td", vec![real(50.0), real(500.0)]),
            op("Tj", vec![Object::string_literal("ab")]),
            op("Tj", vec![Object::string_literal("cd")]),
            op("ET", vec![]),
        ];
        let content = from_operations(&ops, &HashSet::new());
        assert_eq!(content.text_runs.len(), 2);
        let first = content.text_runs[0].transform.apply(0.0, 0.0);
        let second = content.text_runs[1].transform.apply(0.0, 0.0);
        assert_eq!(first, (50.0, 500.0));
        // second run starts after the first run's advance
        assert_eq!(second, (50.0 + 2.0 * 0.5 * 10.0, 500.0));
    }

    #[test]
    fn test_leading_moves_subsequent_lines_down() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name(b"F1"), real(10.0)]),
            op("TD", vec![real(0.0), real(-14.0)]), // sets leading to 14
            op("Tj", vec![Object::string_literal("one")]),
            op("T*", vec![]),
            op("Tj", vec![Object::string_literal("two")]),
            op("ET", vec![]),
        ];
        let content = from_operations(&ops, &HashSet::new());
        assert_eq!(content.text_runs.len(), 2);
        let first = content.text_runs[0].transform.apply(0.0, 0.0);
        let second = content.text_runs[1].transform.apply(0.0, 0.0);
        assert_eq!(first.1 - second.1, 14.0);
        assert_eq!(first.0, second.0);
    }

    #[test]
    fn test_tj_array_applies_kerning_adjustments() {
        let ops = vec![
            op("BT", vec![]),
            op("Tf", vec![name(b"F1"), real(10.0)]),
            op(
                "TJ",
                vec![Object::Array(vec![
                    Object::string_literal("A"),
                    Object::Integer(-100), // shifts 1pt right at size 10
                    Object::string_literal("B"),
                ])],
            ),
            op("ET", vec![]),
        ];
        let content = from_operations(&ops, &HashSet::new());
        assert_eq!(content.text_runs.len(), 2);
        let a_end = 1.0 * 0.5 * 10.0;
        let b_start = content.text_runs[1].transform.apply(0.0, 0.0).0;
        assert_eq!(b_start, a_end + 1.0);
    }

    #[test]
    fn test_ctm_folds_into_run_transforms() {
        let ops = vec![
            op(
                "cm",
                vec![
                    real(2.0),
                    real(0.0),
                    real(0.0),
                    real(2.0),
                    real(0.0),
                    real(0.0),
                ],
            ),
            op("BT", vec![]),
            op("Tf", vec![name(b"F1"), real(10.0)]),
            op("Td", vec![real(30.0), real(40.0)]),
            op("Tj", vec![Object::string_literal("x")]),
            op("ET", vec![]),
        ];
        let content = from_operations(&ops, &HashSet::new());
        assert_eq!(content.text_runs[0].transform.apply(0.0, 0.0), (60.0, 80.0));
    }

    #[test]
    fn test_restore_without_save_is_ignored() {
        let ops = vec![op("Q", vec![]), op("Q", vec![])];
        let content = from_operations(&ops, &HashSet::new());
        assert_eq!(content.operators.len(), 2); // still recorded, stack just stays empty
    }

    #[test]
    fn test_utf16_string_decoding() {
        assert_eq!(
            decode_string_bytes(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]),
            "Hi"
        );
    }

    #[test]
    fn test_unmappable_bytes_dropped() {
        assert_eq!(decode_string_bytes(&[0x01, 0x02, 0x41]), "A");
    }
}
