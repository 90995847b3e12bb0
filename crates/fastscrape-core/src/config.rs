use std::str::FromStr;
use std::time::Duration;

use crate::error::ScrapeError;

const DEFAULT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Delay schedule between attempts of one request.
///
/// Retry `n` (1-indexed) waits `min(initial * factor^(n-1), max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub factor: u32,
    pub max: Duration,
}

impl BackoffPolicy {
    /// Same delay before every retry.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            factor: 1,
            max: delay,
        }
    }

    /// Capped exponential backoff.
    pub fn exponential(initial: Duration, factor: u32, max: Duration) -> Self {
        Self {
            initial,
            factor: factor.max(1),
            max,
        }
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let delay = self
            .factor
            .checked_pow(exponent)
            .and_then(|m| self.initial.checked_mul(m))
            .unwrap_or(self.max);
        std::cmp::min(delay, self.max)
    }
}

impl Default for BackoffPolicy {
    /// 250ms, doubling, capped at 2s.
    fn default() -> Self {
        Self::exponential(Duration::from_millis(250), 2, Duration::from_secs(2))
    }
}

/// Configuration for a [`FastScraper`](crate::orchestrator::FastScraper).
///
/// Validated at construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    timeout: Duration,
    max_retries: u32,
    max_concurrent_requests: usize,
    backoff: BackoffPolicy,
}

impl ScraperConfig {
    pub fn new(
        timeout_ms: u64,
        max_retries: u32,
        max_concurrent_requests: usize,
    ) -> Result<Self, ScrapeError> {
        if timeout_ms == 0 {
            return Err(ScrapeError::Config(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        if max_concurrent_requests == 0 {
            return Err(ScrapeError::Config(
                "max_concurrent_requests must be at least 1".into(),
            ));
        }

        Ok(Self {
            timeout: Duration::from_millis(timeout_ms),
            max_retries,
            max_concurrent_requests,
            backoff: BackoffPolicy::default(),
        })
    }

    /// Read configuration from environment variables.
    ///
    /// - `FASTSCRAPE_TIMEOUT_MS` (optional, defaults to 5000)
    /// - `FASTSCRAPE_MAX_RETRIES` (optional, defaults to 3)
    /// - `FASTSCRAPE_MAX_CONCURRENT` (optional, defaults to 10)
    pub fn from_env() -> Result<Self, ScrapeError> {
        let timeout_ms = env_or("FASTSCRAPE_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let max_retries = env_or("FASTSCRAPE_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
        let max_concurrent = env_or("FASTSCRAPE_MAX_CONCURRENT", DEFAULT_MAX_CONCURRENT)?;
        Self::new(timeout_ms, max_retries, max_concurrent)
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Upper bound on attempts for a single request.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT,
            backoff: BackoffPolicy::default(),
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, ScrapeError> {
    parse_setting(name, std::env::var(name).ok(), default)
}

fn parse_setting<T: FromStr>(name: &str, raw: Option<String>, default: T) -> Result<T, ScrapeError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| {
            ScrapeError::Config(format!(
                "Invalid {name} '{raw}': must be a non-negative integer"
            ))
        }),
    }
}
