//! Tesseract-backed recognition.
//!
//! Runs the `tesseract` binary with TSV output, which carries one row per
//! recognized word with its box and confidence. Level-5 rows are words;
//! lower levels (page/block/paragraph/line) structure the text
//! reconstruction.

use std::io::Write;
use std::process::Command;
use std::time::Instant;

use image::DynamicImage;

use crate::utils::cmd::{binary_available, capture_stdout};

use super::engine::{OcrEngine, OcrError, OcrOutput, OcrWord};

/// Recognition via the tesseract CLI.
pub struct TesseractEngine {
    binary: String,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            binary: "tesseract".to_string(),
        }
    }

    /// Use a non-default tesseract binary.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrEngine for TesseractEngine {
    fn engine_name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        binary_available(&self.binary)
    }

    fn availability_hint(&self) -> String {
        if self.is_available() {
            "tesseract is available".to_string()
        } else {
            "tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        }
    }

    fn recognize(&self, image: &DynamicImage, language: &str) -> Result<OcrOutput, OcrError> {
        let start = Instant::now();

        let mut tmp = tempfile::Builder::new().suffix(".png").tempfile()?;
        image.write_to(&mut tmp, image::ImageFormat::Png)?;
        tmp.flush()?;

        let output = Command::new(&self.binary)
            .arg(tmp.path())
            .arg("stdout")
            .args(["-l", language, "tsv"])
            .output();
        let tsv = capture_stdout(
            output,
            "tesseract (install tesseract-ocr)",
            "tesseract failed",
        )?;

        let mut result = parse_tsv(&tsv);
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

/// A word row's position within the page structure.
type LineKey = (u32, u32, u32);

/// Parse tesseract TSV output into text, words and a mean confidence.
fn parse_tsv(tsv: &str) -> OcrOutput {
    let mut words: Vec<OcrWord> = Vec::new();
    let mut text = String::new();
    let mut current_line: Option<LineKey> = None;

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }
        // level page block par line word left top width height conf text
        let level: u32 = match columns[0].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }
        let confidence: f64 = columns[10].parse().unwrap_or(-1.0);
        let word_text = columns[11].trim();
        if confidence < 0.0 || word_text.is_empty() {
            continue;
        }
        let (Ok(block), Ok(par), Ok(line)) = (
            columns[2].parse::<u32>(),
            columns[3].parse::<u32>(),
            columns[4].parse::<u32>(),
        ) else {
            continue;
        };
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            columns[6].parse::<f64>(),
            columns[7].parse::<f64>(),
            columns[8].parse::<f64>(),
            columns[9].parse::<f64>(),
        ) else {
            continue;
        };

        let line_key = (block, par, line);
        match current_line {
            Some(previous) if previous == line_key => text.push(' '),
            Some(_) => text.push('\n'),
            None => {}
        }
        current_line = Some(line_key);
        text.push_str(word_text);

        words.push(OcrWord {
            text: word_text.to_string(),
            confidence,
            x: left,
            y: top,
            width,
            height,
        });
    }

    let confidence = if words.is_empty() {
        0.0
    } else {
        words.iter().map(|w| w.confidence).sum::<f64>() / words.len() as f64
    };

    OcrOutput {
        text,
        confidence,
        words,
        processing_time_ms: 0,
    }
}
