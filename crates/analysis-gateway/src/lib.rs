pub mod breaker;
pub mod cache;
pub mod config;
pub mod limiter;
pub mod retry;


pub use breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use cache::ResultCache;
pub use config::{GatewayConfig, TierLimits};
pub use limiter::RateLimiter;
pub use retry::{RetryExecutor, RetryPolicy};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use ai_client::{AiServiceConfig, AnalysisServiceClient};
use analysis_core::{
    normalize_ticker, AnalysisBackend, AnalysisReport, CallOutcome, ClientTier, DegradedReport,
    PriceCheck, TransientKind, TrendingSource, TrendingStock,
};

/// How far back the trending aggregation looks
const TRENDING_WINDOW_DAYS: i64 = 7;

/// Caller-visible result of an analysis request. Every failure path maps
/// to one of these kinds; nothing escapes the gateway as an unstructured
/// fault.
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    /// Analysis succeeded; the payload is ready for the persistence
    /// collaborator to store
    Ready(AnalysisReport),
    /// Client exceeded its quota; no downstream call was made
    RateLimited { retry_after: Duration },
    /// Downstream is unhealthy and the breaker refused the call
    CircuitOpen { retry_after: Duration },
    /// Downstream rejected the request itself (e.g. unknown ticker)
    InvalidRequest { ticker: String, message: String },
    /// Retries exhausted; structured fallback instead of a fault
    Degraded(DegradedReport),
}

/// Error form of the same taxonomy, for calls that return `Result`
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Rate limited, retry in {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("Analysis service circuit open, retry in {retry_after:?}")]
    CircuitOpen { retry_after: Duration },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Analysis service unavailable: {0}")]
    Unavailable(String),
}

/// Resilient front door to the AI analysis service.
///
/// Composes the per-client rate limiter, the circuit breaker, the retry
/// executor and the aggregate-result cache. Rate-limit accounting is
/// per client, breaker state is per downstream target, and both per-user
/// and aggregate queries share the same breaker.
pub struct AnalysisGateway {
    config: GatewayConfig,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryExecutor,
    trending_cache: ResultCache<Vec<TrendingStock>>,
    backend: Arc<dyn AnalysisBackend>,
    trending: Arc<dyn TrendingSource>,
}

impl AnalysisGateway {
    pub fn new(
        config: GatewayConfig,
        backend: Arc<dyn AnalysisBackend>,
        trending: Arc<dyn TrendingSource>,
    ) -> Self {
        let limiter = RateLimiter::new(config.free, config.premium);
        let breaker = CircuitBreaker::new(
            "analysis-service",
            BreakerConfig {
                failure_threshold: config.failure_threshold,
                cooldown: config.cooldown,
            },
        );
        let retry = RetryExecutor::new(RetryPolicy {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            max_delay: config.max_delay,
            ..RetryPolicy::default()
        });

        Self {
            config,
            limiter,
            breaker,
            retry,
            trending_cache: ResultCache::new(),
            backend,
            trending,
        }
    }

    /// Build a gateway against the HTTP analysis service, with all
    /// tuning taken from the environment
    pub fn from_env(trending: Arc<dyn TrendingSource>) -> Self {
        let backend = Arc::new(AnalysisServiceClient::new(AiServiceConfig::default()));
        Self::new(GatewayConfig::from_env(), backend, trending)
    }

    /// Request an AI analysis for `ticker` on behalf of a client.
    ///
    /// The request is admitted through the rate limiter first; admitted
    /// requests go downstream through the retry executor and circuit
    /// breaker. Every failure becomes a typed outcome.
    pub async fn request_analysis(
        &self,
        client_id: &str,
        tier: ClientTier,
        ticker: &str,
    ) -> AnalysisOutcome {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return AnalysisOutcome::InvalidRequest {
                ticker,
                message: "Ticker must not be empty".to_string(),
            };
        }

        if !self.limiter.try_admit(client_id, tier) {
            return AnalysisOutcome::RateLimited {
                retry_after: self.limiter.retry_after(client_id, tier),
            };
        }

        tracing::info!("Generating analysis for {} requested by {}", ticker, client_id);

        let outcome = self
            .retry
            .execute(&self.breaker, || {
                self.backend.generate_report(&ticker, client_id)
            })
            .await;

        match outcome {
            CallOutcome::Success(report) => {
                tracing::info!("Analysis complete for {}", ticker);
                AnalysisOutcome::Ready(report)
            }
            CallOutcome::Transient {
                kind: TransientKind::CircuitOpen,
                ..
            } => AnalysisOutcome::CircuitOpen {
                retry_after: self.breaker.retry_after(),
            },
            CallOutcome::Transient { message, .. } => {
                tracing::error!("Analysis degraded for {}: {}", ticker, message);
                AnalysisOutcome::Degraded(DegradedReport::service_outage(&ticker, &message))
            }
            CallOutcome::Permanent { message } => AnalysisOutcome::InvalidRequest { ticker, message },
        }
    }

    /// Quick price lookup through the same retry/breaker path. Not
    /// rate-limited: only full analyses consume quota.
    pub async fn verify_price(&self, ticker: &str) -> Result<PriceCheck, GatewayError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "Ticker must not be empty".to_string(),
            ));
        }

        let outcome = self
            .retry
            .execute(&self.breaker, || self.backend.verify_price(&ticker))
            .await;
        self.call_result(outcome)
    }

    /// Trending-stock ranking over the last week, cached with a short
    /// TTL and computed at most once per key at a time. The wrapped
    /// aggregate query shares breaker state with per-user calls.
    pub async fn trending(&self, limit: usize) -> Result<Vec<TrendingStock>, GatewayError> {
        let key = format!("trending:{}", limit);
        let since = Utc::now() - chrono::Duration::days(TRENDING_WINDOW_DAYS);

        self.trending_cache
            .get_or_compute(&key, self.config.cache_ttl, || async move {
                let outcome = self
                    .retry
                    .execute(&self.breaker, || {
                        self.trending.fetch_trending_since(since, limit)
                    })
                    .await;
                self.call_result(outcome)
            })
            .await
    }

    /// Remaining quota for a client without consuming any of it
    pub fn remaining_quota(&self, client_id: &str, tier: ClientTier) -> u64 {
        self.limiter.remaining(client_id, tier)
    }

    /// Admin function: restore a client's full quota
    pub fn reset_quota(&self, client_id: &str) {
        self.limiter.reset(client_id);
    }

    /// Downstream liveness, bypassing breaker and retries
    pub async fn service_healthy(&self) -> bool {
        self.backend.health().await
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Periodic maintenance: drop rate-limiter buckets that have fully
    /// refilled
    pub fn cleanup(&self) {
        self.limiter.cleanup();
    }

    fn call_result<T>(&self, outcome: CallOutcome<T>) -> Result<T, GatewayError> {
        match outcome {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::Transient {
                kind: TransientKind::CircuitOpen,
                ..
            } => Err(GatewayError::CircuitOpen {
                retry_after: self.breaker.retry_after(),
            }),
            CallOutcome::Transient { message, .. } => Err(GatewayError::Unavailable(message)),
            CallOutcome::Permanent { message } => Err(GatewayError::InvalidRequest(message)),
        }
    }
}
