use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Downstream unhealthy, calls fail fast
    Open,
    /// One probe call in flight to test recovery
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long to stay open before admitting a probe
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Instant,
    probe_at: Instant,
}

/// Consecutive-failure circuit breaker for one downstream target.
///
/// `allow`, `record_success` and `record_failure` compose atomically:
/// all transitions happen under one mutex, so at most one caller wins the
/// half-open probe slot. An abandoned probe (caller dropped mid-call)
/// releases the slot after another cooldown period rather than wedging
/// the breaker in HalfOpen.
pub struct CircuitBreaker {
    target: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(target: impl Into<String>, config: BreakerConfig) -> Self {
        let now = Instant::now();
        Self {
            target: target.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: now,
                probe_at: now,
            }),
        }
    }

    /// May a call be attempted now? In the Open state the first caller
    /// after the cooldown wins the single probe slot; everyone else is
    /// rejected until the probe reports back.
    pub fn allow(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if inner.opened_at.elapsed() >= self.config.cooldown {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_at = Instant::now();
                    tracing::info!("Circuit for {} half-open, admitting probe", self.target);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                // Probe abandoned without reporting; let another caller try
                if inner.probe_at.elapsed() >= self.config.cooldown {
                    inner.probe_at = Instant::now();
                    tracing::warn!("Circuit for {} probe went unanswered, re-probing", self.target);
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                tracing::info!("Circuit for {} closed after successful probe", self.target);
            }
            // Stale success from a call that started before the trip
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Instant::now();
                    tracing::warn!(
                        "Circuit for {} opened after {} consecutive failures",
                        self.target,
                        inner.consecutive_failures
                    );
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Instant::now();
                tracing::warn!("Circuit for {} reopened, probe failed", self.target);
            }
            // Already open; late-arriving outcomes change nothing
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Remaining cooldown, as a retry hint for callers. Zero unless Open.
    pub fn retry_after(&self) -> Duration {
        let inner = self.lock();
        match inner.state {
            CircuitState::Open => self
                .config
                .cooldown
                .saturating_sub(inner.opened_at.elapsed()),
            _ => Duration::ZERO,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("analysis-service", BreakerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn opens_after_threshold_consecutive_failures() {
        let breaker = breaker();
        for _ in 0..4 {
            assert!(breaker.allow());
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn success_resets_the_failure_count() {
        let breaker = breaker();
        for _ in 0..4 {
            breaker.record_failure();
        }
        breaker.record_success();
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_until_cooldown_then_admits_one_probe() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }

        assert!(!breaker.allow());
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!breaker.allow());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(breaker.allow());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // Probe slot is taken; concurrent callers are rejected
        assert!(!breaker.allow());
        assert!(!breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_probe_closes_the_circuit() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.allow());

        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.allow());

        // Counter was reset: it takes a full threshold to trip again
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_probe_reopens_with_fresh_cooldown() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.allow());

        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // The cooldown restarts from the probe failure
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!breaker.allow());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn late_outcomes_while_open_are_ignored() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }

        // Outcomes from calls that started before the trip
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_probe_releases_the_slot() {
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.allow());

        // Probe never reports back (caller dropped); after another
        // cooldown a new probe is admitted
        assert!(!breaker.allow());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(breaker.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_tracks_remaining_cooldown() {
        let breaker = breaker();
        assert_eq!(breaker.retry_after(), Duration::ZERO);

        for _ in 0..5 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(10)).await;
        let hint = breaker.retry_after();
        assert!(hint > Duration::from_secs(19) && hint <= Duration::from_secs(20));
    }
}
