use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;

use analysis_core::ClientTier;

use crate::config::TierLimits;

/// Continuously-refilling token bucket for one client
struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(limits: TierLimits, now: Instant) -> Self {
        Self {
            capacity: limits.capacity,
            refill_per_sec: limits.refill_per_sec(),
            tokens: limits.capacity,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill);
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Token count as of `now`, without mutating the bucket
    fn available(&self, now: Instant) -> f64 {
        let elapsed = now.duration_since(self.last_refill);
        (self.tokens + elapsed.as_secs_f64() * self.refill_per_sec).min(self.capacity)
    }

    fn until_next_token(&self, now: Instant) -> Duration {
        let available = self.available(now);
        if available >= 1.0 {
            return Duration::ZERO;
        }
        let secs = (1.0 - available) / self.refill_per_sec;
        if secs.is_finite() && secs < u64::MAX as f64 {
            Duration::from_secs_f64(secs)
        } else {
            // Zero-refill bucket: the quota never comes back
            Duration::MAX
        }
    }
}

/// Per-client token-bucket rate limiter.
///
/// One bucket per client id, created lazily on first request and retained
/// for the client's lifetime; `cleanup()` sweeps buckets idle long enough
/// to be indistinguishable from fresh ones. Admit-and-consume is atomic
/// per client: the DashMap entry guard serializes access to each bucket.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    free: TierLimits,
    premium: TierLimits,
}

impl RateLimiter {
    pub fn new(free: TierLimits, premium: TierLimits) -> Self {
        Self {
            buckets: DashMap::new(),
            free,
            premium,
        }
    }

    fn limits_for(&self, tier: ClientTier) -> TierLimits {
        match tier {
            ClientTier::Free => self.free,
            ClientTier::Premium => self.premium,
        }
    }

    /// Admit one request for the client, consuming a token. Denial is
    /// immediate and synchronous; nothing ever queues.
    pub fn try_admit(&self, client_id: &str, tier: ClientTier) -> bool {
        let limits = self.limits_for(tier);
        let now = Instant::now();

        let mut entry = self
            .buckets
            .entry(client_id.to_string())
            .or_insert_with(|| TokenBucket::new(limits, now));
        let bucket = entry.value_mut();

        // A tier change (upgrade/downgrade) replaces the bucket wholesale
        if bucket.capacity != limits.capacity {
            *bucket = TokenBucket::new(limits, now);
        }

        bucket.refill(now);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            tracing::warn!("Rate limit exceeded for client {}", client_id);
            false
        }
    }

    /// Current token count without consuming one. A client with no bucket
    /// yet has a full quota.
    pub fn remaining(&self, client_id: &str, tier: ClientTier) -> u64 {
        let limits = self.limits_for(tier);
        match self.buckets.get(client_id) {
            Some(bucket) if bucket.capacity == limits.capacity => {
                bucket.available(Instant::now()).floor() as u64
            }
            _ => limits.capacity.floor() as u64,
        }
    }

    /// Time until the client has at least one token again
    pub fn retry_after(&self, client_id: &str, tier: ClientTier) -> Duration {
        let limits = self.limits_for(tier);
        match self.buckets.get(client_id) {
            Some(bucket) if bucket.capacity == limits.capacity => {
                bucket.until_next_token(Instant::now())
            }
            _ => Duration::ZERO,
        }
    }

    /// Remove the client's bucket; the next request sees a full quota
    pub fn reset(&self, client_id: &str) {
        self.buckets.remove(client_id);
        tracing::info!("Rate limit reset for client {}", client_id);
    }

    /// Drop buckets idle long enough to have fully refilled. Called
    /// periodically by a background task.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.buckets.retain(|_, bucket| {
            let full_refill = bucket.capacity / bucket.refill_per_sec;
            now.duration_since(bucket.last_refill).as_secs_f64() < full_refill
        });
    }
}
