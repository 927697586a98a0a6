//! MIME detection and classification for uploaded files.

/// MIME types the pipeline accepts. Anything else fails fast at submission,
/// before a job is created.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/tiff",
    "image/bmp",
    "image/gif",
    "image/webp",
    "text/plain",
    "text/markdown",
    "text/csv",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

/// Broad handling category for a supported MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Image,
    Docx,
    PlainText,
}

impl DocumentKind {
    /// Classify a MIME type, or `None` when the pipeline cannot process it.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.to_lowercase();
        match mime.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Some(Self::Docx)
            }
            "text/plain" | "text/markdown" | "text/csv" => Some(Self::PlainText),
            _ if mime.starts_with("image/") && is_supported_mime(&mime) => Some(Self::Image),
            _ => None,
        }
    }
}

/// True when the pipeline can process `mime`.
pub fn is_supported_mime(mime: &str) -> bool {
    let mime = mime.to_lowercase();
    SUPPORTED_MIME_TYPES.contains(&mime.as_str())
}

/// Detect a MIME type from file content, falling back to the filename
/// extension. Content sniffing wins when both disagree; browsers lie about
/// uploaded content types more often than magic bytes do.
pub fn detect_mime(bytes: &[u8], filename: &str) -> String {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type().to_string();
    }
    mime_guess::from_path(filename)
        .first()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}
