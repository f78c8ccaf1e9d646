//! Client-side request pacing.
//!
//! Upstream quotas are per API key, not per worker, so one limiter is
//! shared (via `Arc`) by every client holding the same key. Callers
//! queue on the internal mutex; holding it across the sleep keeps the
//! spacing exact under concurrency.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// A limiter that spaces requests to at most `limit` per minute.
    pub fn per_minute(limit: u32) -> Self {
        let limit = limit.max(1);
        Self {
            min_interval: Duration::from_secs_f64(60.0 / f64::from(limit)),
            last_request: Mutex::new(None),
        }
    }

    /// Wait until the next request is allowed to go out.
    pub async fn acquire(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(prev) = *last {
            let next_allowed = prev + self.min_interval;
            let now = Instant::now();
            if next_allowed > now {
                let wait = next_allowed - now;
                trace!(wait_ms = wait.as_millis() as u64, "pacing request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}
