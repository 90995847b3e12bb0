use std::net::IpAddr;
use std::time::Duration;

use fastscrape_core::traits::{RawResponse, Transport, TransportError};
use reqwest::Client;
use url::Url;

const DEFAULT_USER_AGENT: &str = "fastscrape/0.1";

/// HTTP transport using reqwest.
///
/// Sends plain GET requests with a per-attempt timeout. Only `http` and
/// `https` URLs are accepted. Requests to private/reserved addresses are
/// allowed by default; use [`block_private_urls`](Self::block_private_urls)
/// when the URL list comes from untrusted input.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    block_private: bool,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_user_agent(DEFAULT_USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| TransportError::Other(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            block_private: false,
        })
    }

    /// Reject URLs whose host resolves to a private/reserved IP (SSRF guard).
    pub fn block_private_urls(mut self) -> Self {
        self.block_private = true;
        self
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, url: &str, deadline: Duration) -> Result<RawResponse, TransportError> {
        let parsed = validate_url(url)?;
        if self.block_private {
            reject_private_host(&parsed).await?;
        }

        let response = self
            .client
            .get(parsed)
            .timeout(deadline)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Other(format!("Failed to read response body: {e}"))
            }
        })?;

        tracing::trace!(%url, status, bytes = body.len(), "Response received");
        Ok(RawResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() || e.is_request() {
        TransportError::Connect(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidUrl(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// URL checks
// ---------------------------------------------------------------------------

/// Parse `url` and allow only `http`/`https` with a host.
fn validate_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(TransportError::InvalidUrl(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(TransportError::InvalidUrl(format!("{url}: URL has no host")));
    }

    Ok(parsed)
}

/// Resolve the host and refuse it if any address is private/reserved.
async fn reject_private_host(url: &Url) -> Result<(), TransportError> {
    let host = url
        .host_str()
        .ok_or_else(|| TransportError::InvalidUrl("URL has no host".to_string()))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');

    if let Ok(ip) = host.parse::<IpAddr>() {
        return check_ip(host, ip);
    }

    let port = url.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| TransportError::Connect(format!("DNS resolution failed for {host}: {e}")))?
        .collect();

    if addrs.is_empty() {
        return Err(TransportError::Connect(format!(
            "DNS resolution returned no addresses for {host}"
        )));
    }

    addrs.iter().try_for_each(|addr| check_ip(host, addr.ip()))
}

fn check_ip(host: &str, ip: IpAddr) -> Result<(), TransportError> {
    if is_private_ip(ip) {
        Err(TransportError::InvalidUrl(format!(
            "{host} resolves to private/reserved address {ip}"
        )))
    } else {
        Ok(())
    }
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                // 100.64.0.0/10 (CGN)
                || v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fe80::/10
                || (v6.segments()[0] & 0xFFC0) == 0xFE80
                // fc00::/7
                || (v6.segments()[0] & 0xFE00) == 0xFC00
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}
