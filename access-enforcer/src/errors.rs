//! Enforcement-point error types.

use thiserror::Error;

/// Boxed error used where handler implementations surface arbitrary causes.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure to extract an access request from an HTTP request. The enforcer
/// maps every variant to a 400 with an opaque body.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to extract subject: {reason}")]
    Subject { reason: String },

    #[error("no operation extractor found for path {path}")]
    UnknownPath { path: String },

    #[error("no operation extractor found for method {method} on path {path}")]
    UnknownMethod { method: String, path: String },

    #[error("operation extraction failed: {reason}")]
    Operation { reason: String },
}

impl ExtractError {
    pub fn subject(reason: impl Into<String>) -> Self {
        Self::Subject { reason: reason.into() }
    }

    pub fn operation(reason: impl Into<String>) -> Self {
        Self::Operation { reason: reason.into() }
    }
}

/// Configuration rejected while building a request extractor.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("subject extractor is required")]
    MissingSubjectExtractor,

    #[error("path cannot be empty")]
    EmptyPath,

    #[error("method cannot be empty")]
    EmptyMethod,

    #[error("method {method} already registered for path {path}")]
    DuplicateOperation { method: String, path: String },
}

/// Failure inside an obligation or advice handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{reason}")]
    Invalid { reason: String },

    #[error(transparent)]
    Other(#[from] BoxError),
}

impl HandlerError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid { reason: reason.into() }
    }
}
