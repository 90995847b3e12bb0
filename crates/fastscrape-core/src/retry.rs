//! Bounded retry loop for a single logical fetch.
//!
//! # Request states
//!
//! ```text
//! PENDING --[permit]--> ATTEMPTING --[2xx]--> SUCCEEDED
//!                          |    ^
//!                          |    +--[retryable, attempts left, backoff fits budget]
//!                          |
//!                          +--[terminal error | attempts spent | budget spent]--> EXHAUSTED
//! ```
//!
//! The request budget (`ScraperConfig::timeout`) starts once the first permit
//! is granted and covers every attempt, backoff sleep and later permit wait.

use std::time::Duration;

use tokio::time::{Instant, timeout_at};

use crate::classify::{RawFailure, Verdict, classify, classify_response};
use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::limiter::ConcurrencyLimiter;
use crate::traits::Transport;

/// Lifecycle of a [`FetchRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    /// Currently running the given (1-indexed) attempt.
    Attempting(u32),
    Succeeded,
    Exhausted,
}

/// One logical fetch and its per-attempt bookkeeping.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    url: String,
    attempts: u32,
    started: Option<Instant>,
    state: RetryState,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            attempts: 0,
            started: None,
            state: RetryState::Pending,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Time since the request was admitted, zero while still pending.
    pub fn elapsed(&self) -> Duration {
        self.started.map(|t| t.elapsed()).unwrap_or_default()
    }

    fn enter(&mut self, next: RetryState) {
        tracing::trace!(url = %self.url, from = ?self.state, to = ?next, "Request state change");
        self.state = next;
    }
}

/// Terminal result of a [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    Failure(ScrapeError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    pub fn ok(self) -> Option<String> {
        match self {
            FetchOutcome::Success(body) => Some(body),
            FetchOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ScrapeError> {
        match self {
            FetchOutcome::Success(_) => None,
            FetchOutcome::Failure(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<String, ScrapeError> {
        match self {
            FetchOutcome::Success(body) => Ok(body),
            FetchOutcome::Failure(e) => Err(e),
        }
    }
}

/// Drives a [`FetchRequest`] through attempts against a [`Transport`].
pub struct RetryController<'a, T> {
    transport: &'a T,
    limiter: &'a ConcurrencyLimiter,
    config: &'a ScraperConfig,
}

impl<'a, T: Transport> RetryController<'a, T> {
    pub fn new(transport: &'a T, limiter: &'a ConcurrencyLimiter, config: &'a ScraperConfig) -> Self {
        Self {
            transport,
            limiter,
            config,
        }
    }

    /// Run `request` to a terminal outcome.
    pub async fn run(&self, request: &mut FetchRequest) -> FetchOutcome {
        let budget_ms = self.config.timeout_ms();
        let max_attempts = self.config.max_attempts();

        // Queueing for the first slot does not count against the budget.
        let mut permit = match self.limiter.acquire().await {
            Ok(token) => Some(token),
            Err(e) => return self.exhaust(request, e),
        };
        let started = Instant::now();
        let deadline = started + self.config.timeout();
        request.started = Some(started);

        loop {
            let attempt = request.attempts + 1;
            request.attempts = attempt;
            request.enter(RetryState::Attempting(attempt));

            let token = match permit.take() {
                Some(token) => token,
                None => match timeout_at(deadline, self.limiter.acquire()).await {
                    Ok(Ok(token)) => token,
                    Ok(Err(e)) => return self.exhaust(request, e),
                    Err(_) => return self.exhaust(request, ScrapeError::Timeout(budget_ms)),
                },
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.exhaust(request, ScrapeError::Timeout(budget_ms));
            }

            tracing::debug!(url = %request.url, attempt, "Sending request");
            let result = timeout_at(deadline, self.transport.send(&request.url, remaining)).await;
            token.release();

            let verdict: Verdict = match result {
                Err(_) => {
                    tracing::warn!(url = %request.url, attempt, budget_ms, "Request budget elapsed mid-attempt");
                    return self.exhaust(request, ScrapeError::Timeout(budget_ms));
                }
                Ok(Ok(response)) => match classify_response(&request.url, response) {
                    Ok(body) => {
                        request.enter(RetryState::Succeeded);
                        tracing::debug!(url = %request.url, attempt, bytes = body.len(), "Fetched");
                        return FetchOutcome::Success(body);
                    }
                    Err(verdict) => verdict,
                },
                Ok(Err(error)) => classify(RawFailure::Transport {
                    url: &request.url,
                    error,
                    budget_ms,
                }),
            };

            if !verdict.retryable || attempt >= max_attempts {
                return self.exhaust(request, verdict.error);
            }

            let delay = self.config.backoff().delay_for_retry(attempt);
            if Instant::now() + delay >= deadline {
                tracing::debug!(url = %request.url, attempt, "Backoff would overrun request budget");
                return self.exhaust(request, verdict.error);
            }

            tracing::warn!(
                url = %request.url,
                attempt,
                error = %verdict.error,
                delay_ms = delay.as_millis() as u64,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    fn exhaust(&self, request: &mut FetchRequest, error: ScrapeError) -> FetchOutcome {
        request.enter(RetryState::Exhausted);
        tracing::warn!(
            url = %request.url,
            attempts = request.attempts,
            kind = %error.kind(),
            error = %error,
            "Request failed"
        );
        FetchOutcome::Failure(error)
    }
}
