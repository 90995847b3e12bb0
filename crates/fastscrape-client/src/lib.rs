pub mod transport;

pub use transport::ReqwestTransport;

use fastscrape_core::{FastScraper, ScrapeError, ScraperConfig};

/// Build a [`FastScraper`] over the default [`ReqwestTransport`].
pub fn build_scraper(config: ScraperConfig) -> Result<FastScraper<ReqwestTransport>, ScrapeError> {
    let transport = ReqwestTransport::new()
        .map_err(|e| ScrapeError::Config(format!("HTTP client setup failed: {e}")))?;
    Ok(FastScraper::new(config, transport))
}
