// src/error.rs

//! Unified error handling for the bulletin service.

use std::fmt;

use thiserror::Error;

/// Result type alias for bulletin operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Gazette site, scraping proxy or network unreachable
    #[error("Upstream unavailable ({context}): {message}")]
    UpstreamUnavailable { context: String, message: String },

    /// Identifier patterns missing from the listing page scripts
    #[error("Parse error: {0}")]
    Parse(String),

    /// Gazette response no longer matches the expected shape
    #[error("Upstream schema changed: {0}")]
    SchemaChanged(String),

    /// PDF text extraction service failed
    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    /// No records match the request
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal endpoints disabled on this deployment
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad locale or year in the request
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create an upstream-unavailable error with the calling context.
    pub fn upstream(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a schema-changed error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaChanged(message.into())
    }

    /// Create an extraction error.
    pub fn extraction(message: impl fmt::Display) -> Self {
        Self::ExtractionFailed(message.to_string())
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create an invalid-input error.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Parse(_) => "parse_error",
            Self::SchemaChanged(_) => "upstream_schema_changed",
            Self::ExtractionFailed(_) => "extraction_failed",
            Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::InvalidInput(_) => "invalid_input",
            Self::Io(_) | Self::Json(_) | Self::Toml(_) | Self::Url(_) => "internal",
            Self::Config(_) | Self::Validation(_) => "internal",
        }
    }

    /// Whether the error means "nothing there" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_message_carries_context() {
        let err = AppError::upstream("scraper proxy", "status 502");
        assert_eq!(
            err.to_string(),
            "Upstream unavailable (scraper proxy): status 502"
        );
        assert_eq!(err.kind(), "upstream_unavailable");
    }

    #[test]
    fn test_io_error_is_internal() {
        let err: AppError = std::io::Error::other("disk full").into();
        assert_eq!(err.kind(), "internal");
        assert!(!err.is_not_found());
        assert!(AppError::not_found("none").is_not_found());
    }
}
