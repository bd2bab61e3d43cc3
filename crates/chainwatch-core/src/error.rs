//! Error types for the chainwatch core.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building a chain snapshot.
#[derive(Error, Debug)]
pub enum Error {
    /// The topology document has no signatures section at all.
    ///
    /// This fails the whole build: the caller must keep its previously
    /// published snapshot rather than operate on partial data.
    #[error("topology document has no signatures section")]
    MissingSignatures,

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
