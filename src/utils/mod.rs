//! Shared utility functions.
//!
//! - `cmd`: thin wrappers around external process output handling
//! - `mime`: MIME detection and classification for uploaded files

pub mod cmd;
pub mod mime;

pub use cmd::{capture_stdout, expect_success, CommandError};
pub use mime::{detect_mime, is_supported_mime, DocumentKind, SUPPORTED_MIME_TYPES};
