//! Error types for Kino Receiver

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for receiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error vocabulary of the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The inbound command is structurally unusable
    InvalidRequest,
    /// Anything downstream of validation failed
    LoadFailed,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::InvalidRequest => write!(f, "INVALID_REQUEST"),
            ErrorKind::LoadFailed => write!(f, "LOAD_FAILED"),
        }
    }
}

/// Result returned to the control channel instead of a normalized command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
    pub kind: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl ErrorResult {
    pub fn invalid_request() -> Self {
        Self { kind: ErrorKind::InvalidRequest, cause: None }
    }

    pub fn load_failed() -> Self {
        Self { kind: ErrorKind::LoadFailed, cause: None }
    }

    /// Attach an underlying cause code
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }
}

impl std::fmt::Display for ErrorResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{} ({})", self.kind, cause),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl From<&Error> for ErrorResult {
    fn from(err: &Error) -> Self {
        let result = ErrorResult { kind: err.kind(), cause: None };
        match err {
            Error::Engine(engine) => result.with_cause(engine.code.to_string()),
            Error::MissingContentRef | Error::MissingMimeType => result,
            other => result.with_cause(other.error_code()),
        }
    }
}

impl From<Error> for ErrorResult {
    fn from(err: Error) -> Self {
        ErrorResult::from(&err)
    }
}

/// Broad category of a playback engine failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorCategory {
    Network,
    Manifest,
    Media,
    Player,
}

/// Failure reported by the playback engine, either as a load rejection or
/// on its asynchronous error stream
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("engine error {code} ({category:?}): {message}")]
pub struct EngineError {
    /// Engine-specific numeric code
    pub code: u32,
    pub category: EngineErrorCategory,
    pub message: String,
}

impl EngineError {
    pub fn new(code: u32, category: EngineErrorCategory, message: impl Into<String>) -> Self {
        Self { code, category, message: message.into() }
    }
}

/// Receiver error types
#[derive(Error, Debug)]
pub enum Error {
    // Readiness errors
    #[error("Playback engine not supported on this surface")]
    EngineUnsupported,

    #[error("Playback engine initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Playback engine unavailable")]
    EngineUnavailable,

    // Request errors
    #[error("Load command has no content reference")]
    MissingContentRef,

    #[error("Direct load requires a MIME type")]
    MissingMimeType,

    // Catalog errors
    #[error("Failed to fetch catalog: {0}")]
    CatalogFetch(String),

    #[error("Failed to parse catalog: {0}")]
    CatalogParse(String),

    #[error("No catalog configured")]
    CatalogNotConfigured,

    #[error("Content not found in catalog: {id}")]
    CatalogMiss { id: String },

    #[error("No {protocol} manifest for content: {id}")]
    ManifestUnavailable { id: String, protocol: String },

    #[error("Invalid manifest URI: {0}")]
    InvalidManifestUri(String),

    // Load errors
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Another load is already in progress")]
    LoadInProgress,

    #[error("Load timed out after {timeout_ms}ms")]
    LoadTimeout { timeout_ms: u64 },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Control-channel error kind this failure maps to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingContentRef | Error::MissingMimeType => ErrorKind::InvalidRequest,
            _ => ErrorKind::LoadFailed,
        }
    }

    /// Returns the error code reported as the cause
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::EngineUnsupported => "ENGINE_UNSUPPORTED",
            Error::InitializationFailed(_) => "ENGINE_INIT",
            Error::EngineUnavailable => "ENGINE_UNAVAILABLE",
            Error::MissingContentRef => "MISSING_CONTENT_REF",
            Error::MissingMimeType => "MISSING_MIME_TYPE",
            Error::CatalogFetch(_) => "CATALOG_FETCH",
            Error::CatalogParse(_) => "CATALOG_PARSE",
            Error::CatalogNotConfigured => "CATALOG_NOT_CONFIGURED",
            Error::CatalogMiss { .. } => "CATALOG_MISS",
            Error::ManifestUnavailable { .. } => "MANIFEST_UNAVAILABLE",
            Error::InvalidManifestUri(_) => "INVALID_MANIFEST_URI",
            Error::Engine(_) => "ENGINE",
            Error::LoadInProgress => "LOAD_IN_PROGRESS",
            Error::LoadTimeout { .. } => "LOAD_TIMEOUT",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Network(_) => "NETWORK",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_map_to_invalid_request() {
        assert_eq!(Error::MissingMimeType.kind(), ErrorKind::InvalidRequest);
        assert_eq!(Error::MissingContentRef.kind(), ErrorKind::InvalidRequest);
        assert_eq!(ErrorResult::from(Error::MissingMimeType), ErrorResult::invalid_request());
    }

    #[test]
    fn test_engine_error_carries_code() {
        let err = Error::from(EngineError::new(1001, EngineErrorCategory::Network, "bad status"));
        let result = ErrorResult::from(&err);
        assert_eq!(result.kind, ErrorKind::LoadFailed);
        assert_eq!(result.cause.as_deref(), Some("1001"));
    }

    #[test]
    fn test_downstream_errors_carry_error_code() {
        let result = ErrorResult::from(Error::CatalogMiss { id: "abc123".into() });
        assert_eq!(result, ErrorResult::load_failed().with_cause("CATALOG_MISS"));
    }

    #[test]
    fn test_error_result_serialization() {
        let json = serde_json::to_string(&ErrorResult::invalid_request()).unwrap();
        assert_eq!(json, r#"{"kind":"INVALID_REQUEST"}"#);
    }
}
