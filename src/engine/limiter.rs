//! Bounded concurrency for model invocations

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{Error, Result};

/// Counting semaphore that also tracks how many callers are waiting
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    limit: usize,
    waiting: AtomicUsize,
}

/// Decrements the waiter count even if the acquiring future is dropped
struct Waiting<'a>(&'a AtomicUsize);

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting `limit` concurrent holders (at least one)
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            waiting: AtomicUsize::new(0),
        }
    }

    /// Wait for a permit; the slot is released when the permit drops
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let _waiting = Waiting(&self.waiting);
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| Error::Shutdown)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Requests running plus requests waiting for a slot
    pub fn queue_length(&self) -> usize {
        self.limit - self.available() + self.waiting.load(Ordering::SeqCst)
    }

    /// Stop handing out permits; pending and future acquires fail
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl fmt::Display for ConcurrencyLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Semaphore(value={}, locked={})",
            self.available(),
            self.available() == 0
        )
    }
}
