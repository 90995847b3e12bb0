pub mod classify;
pub mod config;
pub mod error;
pub mod limiter;
pub mod orchestrator;
pub mod retry;
pub mod selector;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use config::{BackoffPolicy, ScraperConfig};
pub use error::{ErrorKind, ScrapeError};
pub use orchestrator::FastScraper;
pub use retry::FetchOutcome;
pub use selector::SelectorEngine;
pub use traits::{RawResponse, Transport, TransportError};
