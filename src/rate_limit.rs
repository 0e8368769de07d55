//! Per-host request pacing for outbound page fetches
//!
//! Each host gets a token bucket holding one second's worth of requests.
//! A caller that finds the bucket empty reserves the next token (the balance
//! goes negative) and sleeps outside the lock, so waiting callers for one
//! host queue up in order without blocking other hosts.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::debug;

#[derive(Debug)]
struct Bucket {
    balance: f64,
    refilled_at: Instant,
}

impl Bucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self {
            balance: capacity,
            refilled_at: now,
        }
    }

    /// Take one token and return how long the caller must wait for it.
    fn reserve(&mut self, rate: f64, now: Instant) -> Duration {
        let elapsed = now.saturating_duration_since(self.refilled_at).as_secs_f64();
        self.balance = (self.balance + elapsed * rate).min(rate);
        self.refilled_at = now;

        self.balance -= 1.0;
        if self.balance >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.balance / rate)
        }
    }
}

/// Token buckets keyed by host; a rate of 0 disables pacing.
#[derive(Debug)]
pub struct HostRateLimiter {
    rate: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl HostRateLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            rate: requests_per_second as f64,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.rate > 0.0
    }

    async fn reserve(&self, host: &str) -> Duration {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;
        buckets
            .entry(host.to_ascii_lowercase())
            .or_insert_with(|| Bucket::full(self.rate, now))
            .reserve(self.rate, now)
    }

    /// Wait until a request to `host` is allowed.
    pub async fn acquire(&self, host: &str) {
        if !self.is_enabled() {
            return;
        }

        let wait = self.reserve(host).await;
        if !wait.is_zero() {
            debug!("Pacing {}: waiting {:?}", host, wait);
            sleep(wait).await;
        }
    }
}
