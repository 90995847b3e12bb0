use std::time::{Duration, Instant};

use fastscrape_core::ErrorKind;

use crate::integration::common::{SAMPLE_JSON, TestServer, spawn_server, test_scraper};

#[tokio::test]
async fn fetch_simple_page() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 2, 5);

    let html = scraper.fetch(&server.url("/html")).await.unwrap();
    let lower = html.to_lowercase();
    assert!(lower.contains("<html>"));
    assert!(lower.contains("<body>"));
}

#[tokio::test]
async fn persistent_503_is_retried_then_reported() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 2, 5);

    let err = scraper.fetch(&server.url("/status/503")).await.unwrap_err();
    assert!(err.to_string().contains("HTTP error: 503"));
    assert_eq!(TestServer::count(&server.hits.status), 3);
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 3, 5);

    let err = scraper.fetch(&server.url("/status/404")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HttpStatus(404));
    assert_eq!(TestServer::count(&server.hits.status), 1);
}

#[tokio::test]
async fn flaky_endpoint_recovers_within_retry_budget() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 2, 5);

    let body = scraper.fetch(&server.url("/flaky/2")).await.unwrap();
    assert!(body.contains("recovered"));
    assert_eq!(TestServer::count(&server.hits.flaky), 3);
}

#[tokio::test]
async fn slow_response_times_out() {
    let server = spawn_server().await;
    let scraper = test_scraper(300, 2, 5);

    let start = Instant::now();
    let err = scraper.fetch(&server.url("/delay/3000")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(
        start.elapsed() < Duration::from_millis(2000),
        "timeout took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn fetch_many_respects_concurrency_limit() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 2, 2);

    let urls = vec![server.url("/delay/200"); 4];
    let results = scraper.fetch_many(&urls).await;

    assert_eq!(results.len(), 4);
    assert!(results.iter().all(Option::is_some));
    assert!(TestServer::count(&server.hits.peak_in_flight) <= 2);
}

#[tokio::test]
async fn fetch_many_marks_failures_per_url() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 0, 5);

    let urls = [
        server.url("/html"),
        server.url("/status/404"),
        server.url("/json"),
    ];
    let results = scraper.fetch_many(&urls).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].as_deref().unwrap().contains("Moby-Dick"));
    assert!(results[1].is_none());
    assert_eq!(results[2].as_deref(), Some(SAMPLE_JSON));
}

#[tokio::test]
async fn fetch_many_empty_input() {
    let scraper = test_scraper(5000, 2, 5);
    let results = scraper.fetch_many::<String>(&[]).await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn fetch_json_parses_and_reports_decode_errors() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 1, 5);

    let value = scraper.fetch_json(&server.url("/json")).await.unwrap();
    assert!(value.get("slideshow").is_some());
    assert_eq!(value["slideshow"]["title"], "Sample Slide Show");

    let err = scraper.fetch_json(&server.url("/html")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
}

#[tokio::test]
async fn select_over_fetched_page() {
    let server = spawn_server().await;
    let scraper = test_scraper(5000, 0, 1);

    let html = scraper.fetch(&server.url("/html")).await.unwrap();
    assert_eq!(
        scraper.select(&html, "h1").unwrap(),
        vec!["Herman Melville - Moby-Dick"]
    );
    assert_eq!(
        scraper.select_attr(&html, "body > a", "href").unwrap(),
        vec!["/first", "/second"]
    );
}

#[tokio::test]
async fn refused_connection_is_a_connect_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let scraper = test_scraper(2000, 0, 1);
    let err = scraper.fetch(&format!("http://{addr}/")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connect);
}

#[tokio::test]
async fn unresolvable_host_fails() {
    let scraper = test_scraper(2000, 0, 1);
    let result = scraper
        .fetch("http://invalid-url-that-does-not-exist.invalid/")
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn unsupported_scheme_fails_without_retry() {
    let scraper = test_scraper(2000, 3, 1);
    let err = scraper.fetch("ftp://example.com/file").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Other);
    assert!(err.to_string().contains("Invalid URL"));
}
