//! Error types for the intel daemon.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while polling, refreshing, or delivering intel.
///
/// None of these are fatal to the daemon: the feed loop backs off and
/// retries, the refresh loop keeps the previous snapshot, and the sink
/// degrades to placeholder names.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport or status error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// An upstream service answered 429.
    #[error("rate limited by {0}")]
    RateLimited(&'static str),

    /// Chain snapshot build error (e.g. topology without signatures).
    #[error("chain build error: {0}")]
    Chain(#[from] chainwatch_core::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error came from upstream rate limiting.
    ///
    /// Selects the short backoff delay instead of the long one.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            Error::RateLimited(_) => true,
            Error::Http(e) => e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS),
            _ => false,
        }
    }
}
