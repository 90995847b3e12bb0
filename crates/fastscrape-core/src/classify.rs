//! Maps raw transport, status, decode and selector failures onto the
//! [`ErrorKind`](crate::error::ErrorKind) taxonomy with a retry verdict.

use crate::error::ScrapeError;
use crate::traits::{RawResponse, TransportError};

/// A failure as observed by the core, before classification.
#[derive(Debug)]
pub enum RawFailure<'a> {
    Transport {
        url: &'a str,
        error: TransportError,
        budget_ms: u64,
    },
    Status {
        url: &'a str,
        status: u16,
    },
    Decode(String),
    Selector {
        selector: &'a str,
        reason: String,
    },
}

/// Classified error plus whether another attempt may help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub error: ScrapeError,
    pub retryable: bool,
}

pub fn classify(failure: RawFailure<'_>) -> Verdict {
    let error = match failure {
        RawFailure::Transport {
            url,
            error,
            budget_ms,
        } => match error {
            TransportError::Connect(msg) => ScrapeError::Connect(format!("{url}: {msg}")),
            TransportError::Timeout => ScrapeError::Timeout(budget_ms),
            TransportError::InvalidUrl(msg) => ScrapeError::Other(format!("Invalid URL: {msg}")),
            TransportError::Other(msg) => ScrapeError::Other(msg),
        },
        RawFailure::Status { url, status } => ScrapeError::HttpStatus {
            status,
            url: url.to_string(),
        },
        RawFailure::Decode(msg) => ScrapeError::Decode(msg),
        RawFailure::Selector { selector, reason } => ScrapeError::InvalidSelector {
            selector: selector.to_string(),
            reason,
        },
    };

    let retryable = error.is_retryable();
    Verdict { error, retryable }
}

/// Classify a transport response: `Ok(body)` for 2xx, a verdict otherwise.
pub fn classify_response(url: &str, response: RawResponse) -> Result<String, Verdict> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(classify(RawFailure::Status {
            url,
            status: response.status,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn transport(error: TransportError) -> Verdict {
        classify(RawFailure::Transport {
            url: "https://example.com",
            error,
            budget_ms: 5000,
        })
    }

    #[test]
    fn test_connect_failures_are_retryable() {
        let verdict = transport(TransportError::Connect("connection refused".into()));
        assert_eq!(verdict.error.kind(), ErrorKind::Connect);
        assert!(verdict.retryable);
    }

    #[test]
    fn test_attempt_timeouts_carry_the_budget() {
        let verdict = transport(TransportError::Timeout);
        assert_eq!(verdict.error, ScrapeError::Timeout(5000));
        assert!(verdict.retryable);
    }

    #[test]
    fn test_invalid_urls_are_terminal() {
        let verdict = transport(TransportError::InvalidUrl("relative URL without a base".into()));
        assert_eq!(verdict.error.kind(), ErrorKind::Other);
        assert!(!verdict.retryable);
        assert!(verdict.error.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_server_errors_retry_client_errors_do_not() {
        for status in [500, 502, 503, 504] {
            let verdict = classify(RawFailure::Status {
                url: "https://example.com",
                status,
            });
            assert_eq!(verdict.error.kind(), ErrorKind::HttpStatus(status));
            assert!(verdict.retryable, "{status} should be retryable");
        }
        for status in [400, 401, 403, 404, 429] {
            let verdict = classify(RawFailure::Status {
                url: "https://example.com",
                status,
            });
            assert!(!verdict.retryable, "{status} should be terminal");
        }
    }

    #[test]
    fn test_redirect_status_is_a_terminal_failure() {
        let err = classify_response("https://example.com", RawResponse::new(302, "")).unwrap_err();
        assert_eq!(err.error.kind(), ErrorKind::HttpStatus(302));
        assert!(!err.retryable);
    }

    #[test]
    fn test_success_passes_body_through() {
        let body = classify_response("https://example.com", RawResponse::new(204, "ok")).unwrap();
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_decode_and_selector_failures_are_terminal() {
        let verdict = classify(RawFailure::Decode("expected value at line 1".into()));
        assert_eq!(verdict.error.kind(), ErrorKind::Decode);
        assert!(!verdict.retryable);

        let verdict = classify(RawFailure::Selector {
            selector: "[[[",
            reason: "unexpected token".into(),
        });
        assert_eq!(verdict.error.kind(), ErrorKind::SelectorSyntax);
        assert!(!verdict.retryable);
        assert!(verdict.error.to_string().contains("Invalid selector"));
    }
}
