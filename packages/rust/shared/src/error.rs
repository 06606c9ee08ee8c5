//! Error types for wikireq.
//!
//! Library crates use [`WikiReqError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all wikireq operations.
#[derive(Debug, thiserror::Error)]
pub enum WikiReqError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A page or index could not be fetched or read.
    #[error("source unavailable ({source_name}): {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// Markup or index JSON could not be parsed at all.
    #[error("malformed input: {message}")]
    MalformedInput { message: String },

    /// A requirement marker references a key missing from the index.
    #[error("unresolved requirement reference: {key}")]
    UnresolvedReference { key: String },

    /// A page URL that cannot be decomposed into page id and space key.
    #[error(
        "unsupported page URL: {url} (expected /spaces/SPACE/pages/PAGEID/... or ?pageId=...)"
    )]
    UnsupportedUrlShape { url: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WikiReqError>;

impl WikiReqError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a source-unavailable error for a named source.
    pub fn unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-input error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput {
            message: msg.into(),
        }
    }

    /// Create an unsupported-URL error.
    pub fn unsupported_url(url: impl Into<String>) -> Self {
        Self::UnsupportedUrlShape { url: url.into() }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the pipeline may recover from this error by degrading to empty output.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::SourceUnavailable { .. } | Self::MalformedInput { .. } | Self::Io { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = WikiReqError::config("missing base_url");
        assert_eq!(err.to_string(), "config error: missing base_url");

        let err = WikiReqError::unavailable("page 123", "HTTP 503");
        assert_eq!(err.to_string(), "source unavailable (page 123): HTTP 503");

        let err = WikiReqError::unsupported_url("https://wiki/display/BJS/Title");
        assert!(err.to_string().contains("/display/BJS/Title"));
    }

    #[test]
    fn only_fetch_and_parse_errors_are_recoverable() {
        assert!(WikiReqError::unavailable("x", "y").is_recoverable());
        assert!(WikiReqError::malformed("bad json").is_recoverable());
        assert!(!WikiReqError::unsupported_url("x").is_recoverable());
        assert!(!WikiReqError::config("x").is_recoverable());
    }
}
