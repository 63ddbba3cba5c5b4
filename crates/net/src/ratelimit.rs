//! Per-ecosystem registry rate limiting
//!
//! A token bucket per ecosystem, shared by every concurrent worker.
//! Defaults reflect what the public registries tolerate: debian 1/s,
//! pypi 1/s, npm 2/s, maven 2/s, cratesio 8/s.

use rebuildr_types::Ecosystem;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A token bucket: `rate` tokens per second up to `burst` capacity.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    #[must_use]
    pub fn new(rate: f64, burst: f64) -> Self {
        Self {
            rate,
            burst,
            tokens: burst,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.burst);
        self.last_refill = now;
    }

    /// Take one token, returning how long the caller must wait first.
    fn reserve(&mut self, now: Instant) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Duration::ZERO
        } else {
            let deficit = 1.0 - self.tokens;
            self.tokens -= 1.0;
            Duration::from_secs_f64(deficit / self.rate)
        }
    }
}

/// Shared rate limiter over all ecosystems.
///
/// The buckets are the only ecosystem-wide mutable state in the system;
/// they apply uniformly whether the caller is the pipeline or the
/// benchmark runner.
#[derive(Debug)]
pub struct RegistryLimiter {
    buckets: Mutex<HashMap<Ecosystem, TokenBucket>>,
}

impl RegistryLimiter {
    /// Limiter with the default per-registry rates.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut buckets = HashMap::new();
        for eco in Ecosystem::all() {
            buckets.insert(*eco, TokenBucket::new(Self::default_rate(*eco), 1.0));
        }
        Self {
            buckets: Mutex::new(buckets),
        }
    }

    /// Requests per second tolerated by each registry.
    #[must_use]
    pub fn default_rate(ecosystem: Ecosystem) -> f64 {
        match ecosystem {
            Ecosystem::Debian | Ecosystem::PyPI => 1.0,
            Ecosystem::Npm | Ecosystem::Maven => 2.0,
            Ecosystem::CratesIO => 8.0,
            Ecosystem::Go => 4.0,
        }
    }

    /// Wait until a request to `ecosystem` is allowed, returning the
    /// time spent waiting.
    pub async fn acquire(&self, ecosystem: Ecosystem) -> Duration {
        let wait = {
            let mut buckets = self.buckets.lock().await;
            let bucket = buckets
                .entry(ecosystem)
                .or_insert_with(|| TokenBucket::new(Self::default_rate(ecosystem), 1.0));
            bucket.reserve(Instant::now())
        };
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        wait
    }
}

impl Default for RegistryLimiter {
    fn default() -> Self {
        Self::with_defaults()
    }
}
