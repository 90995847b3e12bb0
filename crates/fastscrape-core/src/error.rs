use std::fmt;

use thiserror::Error;

/// Fixed failure taxonomy attached to every [`ScrapeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connect,
    Timeout,
    HttpStatus(u16),
    Decode,
    SelectorSyntax,
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Connect => write!(f, "connect"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::HttpStatus(code) => write!(f, "http_status({code})"),
            ErrorKind::Decode => write!(f, "decode"),
            ErrorKind::SelectorSyntax => write!(f, "selector_syntax"),
            ErrorKind::Other => write!(f, "other"),
        }
    }
}

/// Error types surfaced by fastscrape.
///
/// Messages are user-facing and stable enough to match on by substring:
/// status failures always contain `HTTP error: <code>` and selector
/// failures always contain `Invalid selector`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScrapeError {
    /// DNS failure, refused or reset connection.
    #[error("Connection error: {0}")]
    Connect(String),

    /// Request budget elapsed before a response arrived.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// Server answered with a non-success status.
    #[error("HTTP error: {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Response body could not be decoded (e.g. invalid JSON).
    #[error("Decode error: {0}")]
    Decode(String),

    /// CSS selector failed to parse.
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Configuration values rejected at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unclassified failure.
    #[error("Request failed: {0}")]
    Other(String),
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScrapeError::Connect(_) => ErrorKind::Connect,
            ScrapeError::Timeout(_) => ErrorKind::Timeout,
            ScrapeError::HttpStatus { status, .. } => ErrorKind::HttpStatus(*status),
            ScrapeError::Decode(_) => ErrorKind::Decode,
            ScrapeError::InvalidSelector { .. } => ErrorKind::SelectorSyntax,
            ScrapeError::Config(_) | ScrapeError::Other(_) => ErrorKind::Other,
        }
    }

    /// Returns true if this error is transient and worth another attempt.
    ///
    /// Timeouts count as retryable here; whether a retry actually happens
    /// is decided by the retry controller against the remaining budget.
    pub fn is_retryable(&self) -> bool {
        match self {
            ScrapeError::Connect(_) | ScrapeError::Timeout(_) => true,
            ScrapeError::HttpStatus { status, .. } => (500..600).contains(status),
            _ => false,
        }
    }
}
