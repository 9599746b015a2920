//! Sampling predicates that bound how many blobs get written.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// A token bucket refilled continuously at `rate` tokens per second.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared rate limiter allowing `rate` writes per second with a one-second burst.
///
/// A rate of zero never grants a permit.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
    rate: f64,
    capacity: f64,
}

impl RateLimiter {
    pub fn new(rate_per_sec: f64) -> Self {
        let rate = rate_per_sec.max(0.0);
        // Fractional rates still need room for one whole token.
        let capacity = if rate > 0.0 { rate.max(1.0) } else { 0.0 };
        Self {
            bucket: Mutex::new(TokenBucket::new(capacity)),
            rate,
            capacity,
        }
    }

    /// Take a permit if one is available. Never waits.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);
        bucket.try_acquire(self.capacity, self.rate)
    }
}

/// Decides whether an eligible capture is actually written.
#[derive(Debug)]
pub enum SamplingPredicate {
    /// Every capture is written.
    Always,
    /// Captures are written while the limiter grants permits.
    RateLimited(RateLimiter),
}

impl SamplingPredicate {
    /// Build the predicate for an optional rate. `None` accepts everything.
    pub fn from_rate(rate_per_sec: Option<f64>) -> Self {
        match rate_per_sec {
            Some(rate) => SamplingPredicate::RateLimited(RateLimiter::new(rate)),
            None => SamplingPredicate::Always,
        }
    }

    pub fn accept(&self) -> bool {
        match self {
            SamplingPredicate::Always => true,
            SamplingPredicate::RateLimited(limiter) => limiter.try_acquire(),
        }
    }
}
