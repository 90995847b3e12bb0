//! Admission control for fetch attempts.
//!
//! A counting semaphore bounds how many attempts may talk to the network at
//! once. Permits are RAII tokens: dropping one (on success, failure, timeout
//! or when the owning future is cancelled) returns the slot.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ScrapeError;

/// Bounds the number of concurrently outstanding [`PermitToken`]s.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

impl ConcurrencyLimiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Wait until a slot is free and claim it.
    pub async fn acquire(&self) -> Result<PermitToken, ScrapeError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ScrapeError::Other("Concurrency limiter closed".into()))?;

        let in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::trace!(in_flight, capacity = self.capacity, "Permit acquired");

        Ok(PermitToken {
            _permit: permit,
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// One unit of the concurrency budget. Released on drop.
#[derive(Debug)]
pub struct PermitToken {
    _permit: OwnedSemaphorePermit,
    in_flight: Arc<AtomicUsize>,
}

impl PermitToken {
    /// Give the slot back. Equivalent to dropping the token.
    pub fn release(self) {}
}

impl Drop for PermitToken {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
