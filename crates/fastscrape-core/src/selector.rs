//! CSS selector queries over HTML documents.
//!
//! Parsing and matching are delegated to `scraper`; this module owns
//! compilation (with an optional bounded cache), error mapping, and the
//! text/attribute extraction rules.

use std::sync::Arc;

use moka::sync::Cache;
use scraper::{ElementRef, Html, Selector};

use crate::classify::{RawFailure, classify};
use crate::error::ScrapeError;

const DEFAULT_CACHE_CAPACITY: u64 = 256;

/// A parsed selector, cheap to clone and share.
pub type CompiledSelector = Arc<Selector>;

/// Compiles selectors and evaluates them against HTML.
#[derive(Clone)]
pub struct SelectorEngine {
    cache: Option<Cache<String, CompiledSelector>>,
}

impl Default for SelectorEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorEngine {
    /// Engine with a bounded compilation cache of 256 selectors.
    pub fn new() -> Self {
        Self::with_cache_capacity(DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_cache_capacity(capacity: u64) -> Self {
        Self {
            cache: Some(Cache::new(capacity)),
        }
    }

    /// Engine that compiles every selector afresh.
    pub fn uncached() -> Self {
        Self { cache: None }
    }

    /// Compile `selector`, failing with [`ScrapeError::InvalidSelector`].
    ///
    /// Only successful compilations are cached.
    pub fn compile(&self, selector: &str) -> Result<CompiledSelector, ScrapeError> {
        if let Some(cache) = &self.cache
            && let Some(compiled) = cache.get(selector)
        {
            return Ok(compiled);
        }

        let compiled = Arc::new(parse_selector(selector)?);
        if let Some(cache) = &self.cache {
            cache.insert(selector.to_string(), Arc::clone(&compiled));
        }
        Ok(compiled)
    }

    /// Text content of every element matching `selector`, in document order.
    pub fn select(&self, html: &str, selector: &str) -> Result<Vec<String>, ScrapeError> {
        let compiled = self.compile(selector)?;
        let document = parse_document(html);
        Ok(query(&document, &compiled)
            .iter()
            .map(extract_text)
            .collect())
    }

    /// Value of `attr` on every matching element that carries it.
    ///
    /// Elements without the attribute are skipped, so the result may be
    /// shorter than the match set.
    pub fn select_attr(
        &self,
        html: &str,
        selector: &str,
        attr: &str,
    ) -> Result<Vec<String>, ScrapeError> {
        let compiled = self.compile(selector)?;
        let document = parse_document(html);
        Ok(query(&document, &compiled)
            .iter()
            .filter_map(|element| extract_attr(element, attr))
            .collect())
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| {
        let reason = e.to_string();
        tracing::debug!(%selector, %reason, "Selector rejected");
        classify(RawFailure::Selector { selector, reason }).error
    })
}

pub fn parse_document(html: &str) -> Html {
    Html::parse_document(html)
}

/// All elements matching `selector`, in document order.
pub fn query<'a>(document: &'a Html, selector: &Selector) -> Vec<ElementRef<'a>> {
    document.select(selector).collect()
}

/// Concatenated descendant text nodes, trimmed.
pub fn extract_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub fn extract_attr(element: &ElementRef<'_>, name: &str) -> Option<String> {
    element.value().attr(name).map(String::from)
}
