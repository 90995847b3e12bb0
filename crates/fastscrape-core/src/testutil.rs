//! Test utilities: a scripted in-memory transport.
//!
//! Handwritten mock for dependency injection in unit tests. State lives
//! behind `Arc<Mutex<_>>` so clones share call records and tests can assert
//! on them afterwards.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{RawResponse, Transport, TransportError};

// ---------------------------------------------------------------------------
// MockReply
// ---------------------------------------------------------------------------

/// One scripted transport reply, optionally delayed.
#[derive(Debug, Clone)]
pub struct MockReply {
    delay: Duration,
    result: Result<RawResponse, TransportError>,
}

impl MockReply {
    pub fn ok(body: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(RawResponse::new(200, body)),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Ok(RawResponse::new(status, format!("status {status}"))),
        }
    }

    pub fn connect_error(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(TransportError::Connect(message.to_string())),
        }
    }

    pub fn timeout() -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(TransportError::Timeout),
        }
    }

    pub fn invalid_url(message: &str) -> Self {
        Self {
            delay: Duration::ZERO,
            result: Err(TransportError::InvalidUrl(message.to_string())),
        }
    }

    /// Hold the reply back for `delay` (virtual time under a paused runtime).
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// Mock transport with per-URL reply scripts.
///
/// Each URL pops replies from its script in order; the last reply repeats
/// forever. Unrouted URLs get the fallback reply (200 with a stub page).
#[derive(Clone)]
pub struct MockTransport {
    routes: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    fallback: MockReply,
    calls: Arc<Mutex<HashMap<String, u32>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(Mutex::new(HashMap::new())),
            fallback: MockReply::ok("<html><body>default</body></html>"),
            calls: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answer every request for `url` with `reply`.
    pub fn route(self, url: &str, reply: MockReply) -> Self {
        self.route_sequence(url, vec![reply])
    }

    pub fn route_sequence(self, url: &str, replies: Vec<MockReply>) -> Self {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), replies.into());
        self
    }

    pub fn with_fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }

    /// Number of `send` calls made for `url`.
    pub fn calls(&self, url: &str) -> u32 {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    /// Highest number of simultaneously running `send` calls observed.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> MockReply {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;

        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(url) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) => script.front().cloned().unwrap_or_else(|| self.fallback.clone()),
            None => self.fallback.clone(),
        }
    }
}

/// Keeps the in-flight gauge honest even when the send future is dropped.
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl InFlightGuard {
    fn enter(in_flight: &Arc<AtomicUsize>, peak: &AtomicUsize) -> Self {
        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        Self {
            in_flight: Arc::clone(in_flight),
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Transport for MockTransport {
    async fn send(&self, url: &str, _deadline: Duration) -> Result<RawResponse, TransportError> {
        let _guard = InFlightGuard::enter(&self.in_flight, &self.peak_in_flight);
        let reply = self.next_reply(url);
        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        reply.result
    }
}
