//! DOCX text extraction.
//!
//! A `.docx` file is a zip archive; the document body lives in
//! `word/document.xml` as WordprocessingML. Text runs (`<w:t>`) within a
//! paragraph concatenate directly; paragraphs become lines.

use std::io::{Cursor, Read};
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use zip::ZipArchive;

#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a readable docx archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("document part unreadable: {0}")]
    Io(#[from] std::io::Error),
}

/// Matches one text run, with or without attributes on the tag.
static TEXT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>").unwrap());

/// Extract the plain text body of a DOCX file.
pub fn extract_text(bytes: &[u8]) -> Result<String, DocxError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")?
        .read_to_string(&mut xml)?;

    let mut lines = Vec::new();
    for paragraph in xml.split("</w:p>") {
        let mut line = String::new();
        for capture in TEXT_RUN.captures_iter(paragraph) {
            line.push_str(&unescape_xml(&capture[1]));
        }
        let line = line.trim();
        if !line.is_empty() {
            lines.push(line.to_string());
        }
    }
    Ok(lines.join("\n"))
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut buf);
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        write!(
            writer,
            r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        )
        .unwrap();
        writer.finish().unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_paragraphs_become_lines() {
        let bytes = docx_with_body(
            "<w:p><w:r><w:t>Quarterly </w:t></w:r><w:r><w:t>report</w:t></w:r></w:p>\
             <w:p><w:r><w:t xml:space=\"preserve\">Second paragraph</w:t></w:r></w:p>",
        );
        let text = extract_text(&bytes).unwrap();
        assert_eq!(text, "Quarterly report\nSecond paragraph");
    }

    #[test]
    fn test_entities_are_unescaped() {
        let bytes = docx_with_body("<w:p><w:r><w:t>5 &lt; 7 &amp; 9 &gt; 2</w:t></w:r></w:p>");
        let text = extract_text(&bytes).unwrap();
        assert_eq!(text, "5 < 7 & 9 > 2");
    }

    #[test]
    fn test_rejects_non_archive_bytes() {
        let err = extract_text(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, DocxError::Archive(_)));
    }

    #[test]
    fn test_rejects_archive_without_document_part() {
        let mut buf = Cursor::new(Vec::new());
        let mut writer = zip::ZipWriter::new(&mut buf);
        writer
            .start_file("unrelated.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        writer.finish().unwrap();

        let err = extract_text(&buf.into_inner()).unwrap_err();
        assert!(matches!(err, DocxError::Archive(_)));
    }
}
