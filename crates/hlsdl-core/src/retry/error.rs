//! Fetch error type for retry classification.

/// Error returned by a single fetch through a [`Transport`](crate::transport::Transport).
/// Kept separate from the higher-level errors so it can be classified before
/// deciding whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// HTTP response had a non-2xx status.
    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u32 },
    /// Connection-level failure reported by a transport that is not curl-backed.
    /// Classified as retryable.
    #[error("transport: {0}")]
    Transport(String),
    /// URI could not be used at all (bad scheme, unparsable). Not retried.
    #[error("invalid URI {0}")]
    InvalidUri(String),
}
