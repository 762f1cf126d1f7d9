use std::time::Duration;

/// Token-bucket parameters for one subscription tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierLimits {
    /// Maximum tokens the bucket can hold
    pub capacity: f64,
    /// Continuous refill rate, expressed per hour
    pub per_hour: f64,
}

impl TierLimits {
    pub fn refill_per_sec(&self) -> f64 {
        self.per_hour / 3600.0
    }
}

/// Gateway tuning knobs. Every value can be overridden from the
/// environment; defaults match production settings.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub free: TierLimits,
    pub premium: TierLimits,
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before admitting a probe
    pub cooldown: Duration,
    /// Downstream invocations per logical call, including the first
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// TTL for cached aggregate queries
    pub cache_ttl: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            free: TierLimits {
                capacity: 10.0,
                per_hour: 10.0,
            },
            premium: TierLimits {
                capacity: 100.0,
                per_hour: 100.0,
            },
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(300),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl GatewayConfig {
    /// Load configuration from the environment, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let free_per_hour: f64 =
            env_parse("GATEWAY_FREE_REQUESTS_PER_HOUR", defaults.free.per_hour);
        let premium_per_hour: f64 = env_parse(
            "GATEWAY_PREMIUM_REQUESTS_PER_HOUR",
            defaults.premium.per_hour,
        );

        let config = Self {
            free: TierLimits {
                capacity: free_per_hour,
                per_hour: free_per_hour,
            },
            premium: TierLimits {
                capacity: premium_per_hour,
                per_hour: premium_per_hour,
            },
            failure_threshold: env_parse("GATEWAY_FAILURE_THRESHOLD", defaults.failure_threshold)
                .max(1),
            cooldown: Duration::from_secs(env_parse(
                "GATEWAY_COOLDOWN_SECS",
                defaults.cooldown.as_secs(),
            )),
            max_attempts: env_parse("GATEWAY_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            base_delay: Duration::from_millis(env_parse(
                "GATEWAY_BASE_DELAY_MS",
                defaults.base_delay.as_millis() as u64,
            )),
            max_delay: Duration::from_secs(env_parse(
                "GATEWAY_MAX_DELAY_SECS",
                defaults.max_delay.as_secs(),
            )),
            cache_ttl: Duration::from_secs(env_parse(
                "GATEWAY_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
        };

        tracing::info!(
            "Gateway config: free {}/h, premium {}/h, breaker {} failures / {}s cooldown, {} attempts",
            config.free.per_hour,
            config.premium.per_hour,
            config.failure_threshold,
            config.cooldown.as_secs(),
            config.max_attempts
        );

        config
    }
}
