//! Engine error types and message sanitization.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

use gifsmith_media::MediaError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Capacity exceeded: {0}")]
    Capacity(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn capacity(msg: impl Into<String>) -> Self {
        Self::Capacity(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }
}

static WINDOWS_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]:\\\S+").expect("valid regex"));
static UNIX_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/\S+").expect("valid regex"));

const MAX_MESSAGE_LEN: usize = 200;

/// Strip filesystem paths from an error message and cap its length.
///
/// Whatever made it into the message internally, nothing resembling a
/// path or an endless dump crosses the external boundary.
pub fn sanitize_message(message: &str) -> String {
    let cleaned = WINDOWS_PATH.replace_all(message, "[path]");
    let cleaned = UNIX_PATH.replace_all(&cleaned, "[path]");

    let mut out: String = cleaned.into_owned();
    if out.len() > MAX_MESSAGE_LEN {
        let mut cut = MAX_MESSAGE_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_unix_paths() {
        let msg = sanitize_message("No such file: /srv/uploads/secret.mp4 (os error 2)");
        assert!(!msg.contains("/srv"));
        assert!(msg.contains("[path]"));
    }

    #[test]
    fn test_strips_windows_paths() {
        let msg = sanitize_message(r"cannot open C:\Users\admin\video.mp4");
        assert!(!msg.contains("admin"));
        assert!(msg.contains("[path]"));
    }

    #[test]
    fn test_truncates_long_messages() {
        let long = "x".repeat(500);
        let msg = sanitize_message(&long);
        assert!(msg.len() <= MAX_MESSAGE_LEN + 3);
        assert!(msg.ends_with("..."));
    }
}
