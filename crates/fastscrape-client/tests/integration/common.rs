use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::get;

use fastscrape_client::{ReqwestTransport, build_scraper};
use fastscrape_core::{BackoffPolicy, FastScraper, ScraperConfig};

pub const SAMPLE_JSON: &str = r#"{"slideshow": {"author": "Yours Truly", "title": "Sample Slide Show"}}"#;

const SAMPLE_HTML: &str = r#"<!DOCTYPE html>
<html>
  <head><title>Sample</title></head>
  <body>
    <h1>Herman Melville - Moby-Dick</h1>
    <a href="/first">First</a>
    <a href="/second">Second</a>
  </body>
</html>"#;

/// Request counters shared with the handlers.
#[derive(Default)]
pub struct Hits {
    pub status: AtomicUsize,
    pub flaky: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub hits: Arc<Hits>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Start a local HTTP server on an ephemeral port.
pub async fn spawn_server() -> TestServer {
    let hits = Arc::new(Hits::default());

    let app = Router::new()
        .route("/html", get(html_page))
        .route("/json", get(json_doc))
        .route("/status/{code}", get(status))
        .route("/delay/{ms}", get(delay))
        .route("/flaky/{failures}", get(flaky))
        .with_state(Arc::clone(&hits));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let addr = listener.local_addr().expect("Failed to read local address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server crashed");
    });

    TestServer { addr, hits }
}

/// Scraper over the real reqwest transport with a short fixed backoff.
pub fn test_scraper(
    timeout_ms: u64,
    max_retries: u32,
    max_concurrent: usize,
) -> FastScraper<ReqwestTransport> {
    let config = ScraperConfig::new(timeout_ms, max_retries, max_concurrent)
        .expect("Invalid test config")
        .with_backoff(BackoffPolicy::fixed(Duration::from_millis(10)));
    build_scraper(config).expect("Failed to build scraper")
}

async fn html_page() -> Html<&'static str> {
    Html(SAMPLE_HTML)
}

async fn json_doc() -> impl IntoResponse {
    ([("content-type", "application/json")], SAMPLE_JSON)
}

async fn status(State(hits): State<Arc<Hits>>, Path(code): Path<u16>) -> impl IntoResponse {
    hits.status.fetch_add(1, Ordering::SeqCst);
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST);
    (status, format!("status {code}"))
}

async fn delay(State(hits): State<Arc<Hits>>, Path(ms): Path<u64>) -> Html<String> {
    let now = hits.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    hits.peak_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(ms)).await;
    hits.in_flight.fetch_sub(1, Ordering::SeqCst);
    Html(format!("<html><body><p>waited {ms}ms</p></body></html>"))
}

/// Answers 503 for the first `failures` calls, then 200.
async fn flaky(State(hits): State<Arc<Hits>>, Path(failures): Path<usize>) -> impl IntoResponse {
    let seen = hits.flaky.fetch_add(1, Ordering::SeqCst);
    if seen < failures {
        (StatusCode::SERVICE_UNAVAILABLE, "try again".to_string())
    } else {
        (StatusCode::OK, format!("recovered after {seen} failures"))
    }
}
