// src/cache.rs

use std::future::Future;
use std::time::{Duration, Instant};
use tracing::debug;

/// Holds one value for at most `ttl`; after that the next read recomputes it from scratch.
#[derive(Debug)]
pub struct Memo<T> {
    ttl: Duration,
    slot: Option<(Instant, T)>,
}

impl<T> Memo<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, slot: None }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Age of the stored value, if any.
    pub fn age(&self) -> Option<Duration> {
        self.slot.as_ref().map(|(at, _)| at.elapsed())
    }

    pub fn is_fresh(&self) -> bool {
        self.age().is_some_and(|age| age < self.ttl)
    }

    /// The stored value while it is still fresh.
    pub fn peek(&self) -> Option<&T> {
        if self.is_fresh() {
            self.slot.as_ref().map(|(_, v)| v)
        } else {
            None
        }
    }

    pub fn invalidate(&mut self) {
        self.slot = None;
    }

    /// Return the cached value, or run `refresh` and cache its output.
    pub async fn get_or_refresh<F, Fut>(&mut self, refresh: F) -> &T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let fresh = self.is_fresh();
        let entry = match self.slot.take() {
            Some(entry) if fresh => entry,
            _ => {
                debug!(ttl_secs = self.ttl.as_secs(), "memo expired; recomputing");
                (Instant::now(), refresh().await)
            }
        };
        &self.slot.insert(entry).1
    }
}
