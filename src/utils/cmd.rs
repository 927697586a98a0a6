//! Helpers for invoking external tools (poppler-utils, tesseract).
//!
//! All extraction subprocesses funnel through these two functions so the
//! "binary missing" case produces an actionable error instead of a raw
//! `NotFound` io error.

use thiserror::Error;

/// Errors from external tool invocations.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    #[error("{0}")]
    Failed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle command output, extracting stdout on success.
///
/// `tool_name` should include an install hint, e.g.
/// `"pdftotext (install poppler-utils)"`.
pub fn capture_stdout(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
    error_prefix: &str,
) -> Result<String, CommandError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(CommandError::Failed(format!(
                    "{}: {}",
                    error_prefix,
                    stderr.trim()
                )))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CommandError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(CommandError::Io(e)),
    }
}

/// Check command status, returning an error on failure.
pub fn expect_success(
    result: std::io::Result<std::process::ExitStatus>,
    tool_name: &str,
    error_msg: &str,
) -> Result<(), CommandError> {
    match result {
        Ok(s) if s.success() => Ok(()),
        Ok(_) => Err(CommandError::Failed(error_msg.to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(CommandError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(CommandError::Io(e)),
    }
}

/// True when `binary` is resolvable on PATH.
pub fn binary_available(binary: &str) -> bool {
    which::which(binary).is_ok()
}
