//! Error types for the progressive media loader.

use thiserror::Error;

/// Errors raised by the loader and its collaborators.
///
/// Per-element failures (fetch, timeout, initializer) never abort the
/// loader; they are recorded against the element and logged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoaderError {
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("fetch timed out after {timeout_ms}ms for {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("element has an empty resource reference")]
    EmptyResource,

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("initializer failed for {kind} asset: {reason}")]
    Initializer { kind: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LoaderError>;
