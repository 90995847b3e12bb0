use futures::future::join_all;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::classify::{RawFailure, classify};
use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::limiter::ConcurrencyLimiter;
use crate::retry::{FetchOutcome, FetchRequest, RetryController};
use crate::selector::SelectorEngine;
use crate::traits::Transport;

/// Fetch and query façade: bounded-concurrency fetching with retries, plus
/// CSS selector extraction over HTML.
///
/// Generic over the [`Transport`] so tests can run without real HTTP.
/// Clones share the same concurrency budget.
#[derive(Clone)]
pub struct FastScraper<T> {
    transport: T,
    config: ScraperConfig,
    limiter: ConcurrencyLimiter,
    selectors: SelectorEngine,
}

impl<T: Transport> FastScraper<T> {
    pub fn new(config: ScraperConfig, transport: T) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_requests());
        Self {
            transport,
            config,
            limiter,
            selectors: SelectorEngine::new(),
        }
    }

    /// Replace the default (cached) selector engine.
    pub fn with_selector_engine(mut self, selectors: SelectorEngine) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Fetch one URL, retrying transient failures within the request budget.
    pub async fn fetch(&self, url: &str) -> Result<String, ScrapeError> {
        self.run(url).await.into_result()
    }

    /// Fetch many URLs concurrently; `None` marks a URL that failed.
    ///
    /// Output position `i` always corresponds to `urls[i]`.
    pub async fn fetch_many<S: AsRef<str>>(&self, urls: &[S]) -> Vec<Option<String>> {
        self.fetch_many_outcomes(urls)
            .await
            .into_iter()
            .map(FetchOutcome::ok)
            .collect()
    }

    /// Like [`fetch_many`](Self::fetch_many), keeping each failure's error.
    pub async fn fetch_many_outcomes<S: AsRef<str>>(&self, urls: &[S]) -> Vec<FetchOutcome> {
        self.run_batch(urls, None).await
    }

    /// Like [`fetch_many_outcomes`](Self::fetch_many_outcomes), but requests
    /// still running when `cancel` fires are abandoned and reported as
    /// cancelled. Finished requests keep their outcome.
    pub async fn fetch_many_with_cancel<S: AsRef<str>>(
        &self,
        urls: &[S],
        cancel: &CancellationToken,
    ) -> Vec<FetchOutcome> {
        self.run_batch(urls, Some(cancel)).await
    }

    /// Fetch `url` and parse the body as JSON.
    pub async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, ScrapeError> {
        self.fetch_json_as(url).await
    }

    /// Fetch `url` and deserialize the body into `D`.
    pub async fn fetch_json_as<D: DeserializeOwned>(&self, url: &str) -> Result<D, ScrapeError> {
        let body = self.fetch(url).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(%url, error = %e, "Response body is not valid JSON");
            classify(RawFailure::Decode(e.to_string())).error
        })
    }

    /// Text of every element in `html` matching `selector`.
    pub fn select(&self, html: &str, selector: &str) -> Result<Vec<String>, ScrapeError> {
        self.selectors.select(html, selector)
    }

    /// Value of `attr` on every matching element that has it.
    pub fn select_attr(
        &self,
        html: &str,
        selector: &str,
        attr: &str,
    ) -> Result<Vec<String>, ScrapeError> {
        self.selectors.select_attr(html, selector, attr)
    }

    async fn run(&self, url: &str) -> FetchOutcome {
        let mut request = FetchRequest::new(url);
        RetryController::new(&self.transport, &self.limiter, &self.config)
            .run(&mut request)
            .await
    }

    async fn run_batch<S: AsRef<str>>(
        &self,
        urls: &[S],
        cancel: Option<&CancellationToken>,
    ) -> Vec<FetchOutcome> {
        if urls.is_empty() {
            return Vec::new();
        }

        tracing::info!(
            total = urls.len(),
            max_concurrent = self.limiter.capacity(),
            "Fetching batch"
        );

        // join_all yields results in input order, whatever the completion order.
        let outcomes = join_all(urls.iter().map(|url| async move {
            let url = url.as_ref();
            match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(%url, "Request cancelled");
                        FetchOutcome::Failure(ScrapeError::Other("Request cancelled".into()))
                    }
                    outcome = self.run(url) => outcome,
                },
                None => self.run(url).await,
            }
        }))
        .await;

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        tracing::info!(
            total = outcomes.len(),
            succeeded,
            failed = outcomes.len() - succeeded,
            "Batch complete"
        );

        outcomes
    }
}
