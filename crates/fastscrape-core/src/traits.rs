use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Raw response handed back by a [`Transport`], before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Low-level transport failure, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// DNS resolution, connection refused/reset, or send failure.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The attempt exceeded the deadline passed to [`Transport::send`].
    #[error("attempt timed out")]
    Timeout,
    /// The URL was malformed or refused before any I/O.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    /// Anything else (body read failures, protocol errors).
    #[error("{0}")]
    Other(String),
}

/// Sends a single GET request.
///
/// Implementations own connection reuse, TLS and DNS. They must not retry
/// on their own; retry policy lives in the core.
pub trait Transport: Send + Sync + Clone {
    /// Fetch `url`, giving up after `deadline`.
    fn send(
        &self,
        url: &str,
        deadline: Duration,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;
}
