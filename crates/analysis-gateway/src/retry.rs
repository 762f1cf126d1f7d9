use rand::Rng;
use std::future::Future;
use std::time::Duration;

use analysis_core::{CallOutcome, TransientKind};

use crate::breaker::CircuitBreaker;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Downstream invocations per logical call, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Randomization applied to each delay (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter_factor: 0.2,
        }
    }
}

/// Wraps one logical downstream call with bounded retries and exponential
/// backoff, consulting the circuit breaker before every attempt and
/// reporting each outcome back to it.
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(mut policy: RetryPolicy) -> Self {
        policy.max_attempts = policy.max_attempts.max(1);
        Self { policy }
    }

    /// Execute `call` until it succeeds, fails permanently, or attempts
    /// are exhausted. A breaker refusal returns immediately without
    /// consuming an attempt. Permanent failures are returned untouched:
    /// the request was bad, the downstream is healthy.
    pub async fn execute<T, F, Fut>(&self, breaker: &CircuitBreaker, mut call: F) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CallOutcome<T>>,
    {
        let mut last_failure = None;

        for attempt in 1..=self.policy.max_attempts {
            if !breaker.allow() {
                return CallOutcome::transient(
                    TransientKind::CircuitOpen,
                    "circuit open, call not attempted",
                );
            }

            match call().await {
                CallOutcome::Success(value) => {
                    breaker.record_success();
                    return CallOutcome::Success(value);
                }
                outcome @ CallOutcome::Permanent { .. } => return outcome,
                CallOutcome::Transient { kind, message } => {
                    breaker.record_failure();
                    tracing::warn!(
                        "Attempt {}/{} failed ({}): {}",
                        attempt,
                        self.policy.max_attempts,
                        kind.as_str(),
                        message
                    );
                    last_failure = Some((kind, message));

                    if attempt < self.policy.max_attempts {
                        tokio::time::sleep(self.backoff_delay(attempt)).await;
                    }
                }
            }
        }

        match last_failure {
            Some((kind, message)) => CallOutcome::Transient { kind, message },
            None => CallOutcome::transient(TransientKind::Transport, "no attempts made"),
        }
    }

    /// Delay before the attempt following `attempt`: exponential in the
    /// attempt number, jittered, capped at `max_delay`
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .policy
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.policy.max_delay);

        if self.policy.jitter_factor == 0.0 {
            return capped;
        }

        let jitter = (rand::thread_rng().gen::<f64>() - 0.5) * self.policy.jitter_factor;
        let jittered = Duration::from_secs_f64(capped.as_secs_f64() * (1.0 + jitter));
        jittered.min(self.policy.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerConfig, CircuitState};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn no_jitter_policy() -> RetryPolicy {
        RetryPolicy {
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        }
    }

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new("analysis-service", BreakerConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_makes_one_call() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let breaker = breaker();
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { CallOutcome::Success(42) }
            })
            .await;

        assert!(matches!(outcome, CallOutcome::Success(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_retry_up_to_max_attempts() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let breaker = breaker();
        let calls = AtomicU32::new(0);

        let outcome: CallOutcome<()> = executor
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { CallOutcome::transient(TransientKind::Timeout, "read timed out") }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match outcome {
            CallOutcome::Transient { kind, .. } => assert_eq!(kind, TransientKind::Timeout),
            other => panic!("expected transient, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_when_a_later_attempt_succeeds() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let breaker = breaker();
        let calls = AtomicU32::new(0);

        let outcome = executor
            .execute(&breaker, || {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        CallOutcome::transient(TransientKind::Timeout, "read timed out")
                    } else {
                        CallOutcome::Success("attempt-3 payload")
                    }
                }
            })
            .await;

        assert!(matches!(outcome, CallOutcome::Success("attempt-3 payload")));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_never_retried() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let breaker = breaker();
        let calls = AtomicU32::new(0);

        let outcome: CallOutcome<()> = executor
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { CallOutcome::permanent("Unknown ticker: ZZZZ") }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, CallOutcome::Permanent { .. }));

        // A bad request is not a downstream-health signal
        for _ in 0..10 {
            let _: CallOutcome<()> = executor
                .execute(&breaker, || async {
                    CallOutcome::permanent("Unknown ticker: ZZZZ")
                })
                .await;
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_short_circuits_without_calling() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let breaker = breaker();
        for _ in 0..5 {
            breaker.record_failure();
        }

        let calls = AtomicU32::new(0);
        let outcome: CallOutcome<()> = executor
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { CallOutcome::Success(()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        match outcome {
            CallOutcome::Transient { kind, .. } => assert_eq!(kind, TransientKind::CircuitOpen),
            other => panic!("expected circuit-open, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_tripping_mid_call_stops_the_retry_loop() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let breaker = CircuitBreaker::new(
            "analysis-service",
            BreakerConfig {
                failure_threshold: 2,
                cooldown: Duration::from_secs(30),
            },
        );
        let calls = AtomicU32::new(0);

        let outcome: CallOutcome<()> = executor
            .execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { CallOutcome::transient(TransientKind::ServerError, "Status: 503") }
            })
            .await;

        // The second failure opened the circuit; the third attempt was refused
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match outcome {
            CallOutcome::Transient { kind, .. } => assert_eq!(kind, TransientKind::CircuitOpen),
            other => panic!("expected circuit-open, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_delays_grow_exponentially() {
        let executor = RetryExecutor::new(no_jitter_policy());
        let breaker = breaker();

        let start = tokio::time::Instant::now();
        let _: CallOutcome<()> = executor
            .execute(&breaker, || async {
                CallOutcome::transient(TransientKind::Timeout, "read timed out")
            })
            .await;

        // Sleeps between three attempts: 500ms + 1000ms
        assert_eq!(start.elapsed(), Duration::from_millis(1500));
    }

    #[test]
    fn backoff_delay_caps_at_max() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
            jitter_factor: 0.0,
        });

        assert_eq!(executor.backoff_delay(1), Duration::from_millis(500));
        assert_eq!(executor.backoff_delay(2), Duration::from_secs(1));
        assert_eq!(executor.backoff_delay(3), Duration::from_secs(2));
        assert_eq!(executor.backoff_delay(8), Duration::from_secs(2));
    }

    #[test]
    fn jitter_produces_varying_delays() {
        let executor = RetryExecutor::new(RetryPolicy {
            jitter_factor: 0.5,
            ..RetryPolicy::default()
        });

        let delays: Vec<Duration> = (0..8).map(|_| executor.backoff_delay(2)).collect();
        let all_equal = delays.windows(2).all(|w| w[0] == w[1]);
        assert!(!all_equal, "jitter should produce varying delays");
    }
}
