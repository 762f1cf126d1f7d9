use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use analysis_core::{
    AnalysisBackend, AnalysisReport, CallOutcome, PriceCheck, Recommendation,
};

use crate::error::{AiError, AiResult};
use crate::AiServiceConfig;

#[derive(Debug, Clone, Serialize)]
struct GenerateReportRequest {
    company_name: String,
    email: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateReportResponse {
    success: bool,
    live_data: Option<serde_json::Value>,
    report: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct VerifyPriceResponse {
    ticker: Option<String>,
    price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    valid: bool,
    error: Option<String>,
}

/// HTTP client for the Python AI analysis service
#[derive(Clone)]
pub struct AnalysisServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl AnalysisServiceClient {
    pub fn new(config: AiServiceConfig) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .expect("Failed to create HTTP client");

        tracing::info!("Analysis service client initialized. URL: {}", config.base_url);

        Self {
            client,
            base_url: config.base_url,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AiServiceConfig::default())
    }

    /// Request a full analysis report
    async fn generate_report_inner(
        &self,
        ticker: &str,
        client_id: &str,
    ) -> AiResult<AnalysisReport> {
        let request = GenerateReportRequest {
            company_name: ticker.to_string(),
            email: client_id.to_string(),
        };

        tracing::debug!("POST {}/api/generate-report for {}", self.base_url, ticker);

        let response = self
            .client
            .post(format!("{}/api/generate-report", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AiError::Rejected(format!("Status: {}", status)));
        }
        if !status.is_success() {
            return Err(AiError::ServiceUnavailable(format!("Status: {}", status)));
        }

        let body = response.json::<GenerateReportResponse>().await?;
        if !body.success {
            return Err(AiError::ServiceUnavailable(
                body.error
                    .unwrap_or_else(|| "Analysis service returned unsuccessful response".to_string()),
            ));
        }

        let report_text = body
            .report
            .ok_or_else(|| AiError::InvalidResponse("Missing report text".to_string()))?;
        let live_data = body.live_data.unwrap_or(serde_json::Value::Null);

        Ok(AnalysisReport {
            ticker: ticker.to_string(),
            company_name: string_field(&live_data, "company_name"),
            current_price: f64_field(&live_data, "current_price"),
            currency: string_field(&live_data, "currency"),
            market_cap: i64_field(&live_data, "market_cap"),
            recommendation: Recommendation::from_report_text(&report_text),
            report: report_text,
            live_data,
            generated_at: Utc::now(),
        })
    }

    /// Quick price lookup without a full analysis
    async fn verify_price_inner(&self, ticker: &str) -> AiResult<PriceCheck> {
        let response = self
            .client
            .get(format!("{}/api/verify-price/{}", self.base_url, ticker))
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() {
            return Err(AiError::Rejected(format!("Status: {}", status)));
        }
        if !status.is_success() {
            return Err(AiError::ServiceUnavailable(format!("Status: {}", status)));
        }

        let body = response.json::<VerifyPriceResponse>().await?;
        if !body.valid {
            return Err(AiError::Rejected(
                body.error
                    .unwrap_or_else(|| format!("Unknown ticker: {}", ticker)),
            ));
        }

        Ok(PriceCheck {
            ticker: body.ticker.unwrap_or_else(|| ticker.to_string()),
            price: body.price,
            currency: body.currency,
        })
    }
}

#[async_trait]
impl AnalysisBackend for AnalysisServiceClient {
    async fn generate_report(&self, ticker: &str, client_id: &str) -> CallOutcome<AnalysisReport> {
        match self.generate_report_inner(ticker, client_id).await {
            Ok(report) => CallOutcome::Success(report),
            Err(e) => e.into_outcome(),
        }
    }

    async fn verify_price(&self, ticker: &str) -> CallOutcome<PriceCheck> {
        match self.verify_price_inner(ticker).await {
            Ok(price) => CallOutcome::Success(price),
            Err(e) => e.into_outcome(),
        }
    }

    async fn health(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/health", self.base_url))
            .send()
            .await;

        match response {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::warn!("Analysis service health check failed: {}", e);
                false
            }
        }
    }
}

fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    value.get(key).and_then(|v| match v {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    })
}

fn f64_field(value: &serde_json::Value, key: &str) -> Option<f64> {
    value.get(key).and_then(|v| v.as_f64())
}

fn i64_field(value: &serde_json::Value, key: &str) -> Option<i64> {
    value.get(key).and_then(|v| v.as_i64())
}
