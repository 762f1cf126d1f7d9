pub mod client;
pub mod error;

pub use client::AnalysisServiceClient;
pub use error::{AiError, AiResult};

use std::time::Duration;

/// Configuration for the AI analysis service
#[derive(Debug, Clone)]
pub struct AiServiceConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

impl Default for AiServiceConfig {
    fn default() -> Self {
        let read_secs = std::env::var("ANALYSIS_SERVICE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30u64);
        let connect_secs = std::env::var("ANALYSIS_SERVICE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5u64);

        Self {
            base_url: std::env::var("ANALYSIS_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            connect_timeout: Duration::from_secs(connect_secs),
            read_timeout: Duration::from_secs(read_secs),
        }
    }
}
