//! Runtime adapters for the clock and jitter ports.

use async_trait::async_trait;
use ensemble_application::{Clock, JitterSource};
use rand::Rng;
use std::time::{Duration, Instant};

/// Wall clock backed by tokio time.
///
/// Going through `tokio::time` keeps paused-runtime tests deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry jitter drawn uniformly from `[1 - spread, 1 + spread]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn factor(&self, spread: f64) -> f64 {
        if !spread.is_finite() || spread <= 0.0 {
            return 1.0;
        }
        let spread = spread.min(0.99);
        rand::rng().random_range(1.0 - spread..=1.0 + spread)
    }
}
