//! Time and randomness ports
//!
//! The dispatcher and worker gate never read the wall clock or draw random
//! numbers directly, so tests can pin both.

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Monotonic clock with an async sleep.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);
}

/// Source of multiplicative jitter for retry backoff.
pub trait JitterSource: Send + Sync {
    /// A factor drawn from `[1 - spread, 1 + spread]`.
    fn factor(&self, spread: f64) -> f64;
}

/// Jitter source that always returns 1.0.
pub struct NoJitter;

impl JitterSource for NoJitter {
    fn factor(&self, _spread: f64) -> f64 {
        1.0
    }
}
