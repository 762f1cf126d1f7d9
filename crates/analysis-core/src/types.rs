use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier of the requesting client. Determines rate-limit quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientTier {
    Free,
    Premium,
}

/// Buy/hold/sell call extracted from the AI report text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recommendation {
    Buy,
    Hold,
    Sell,
}

impl Recommendation {
    /// Scan the report text for a recommendation. Defaults to Hold when
    /// the report is ambiguous or empty.
    pub fn from_report_text(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains("STRONG BUY") || (upper.contains("BUY") && !upper.contains("DON'T BUY")) {
            Recommendation::Buy
        } else if upper.contains("SELL") || upper.contains("AVOID") {
            Recommendation::Sell
        } else {
            Recommendation::Hold
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Sell => "SELL",
        }
    }
}

/// A completed AI stock analysis, ready for the persistence collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub ticker: String,
    pub company_name: Option<String>,
    pub current_price: Option<f64>,
    pub currency: Option<String>,
    pub market_cap: Option<i64>,
    pub recommendation: Recommendation,
    /// Full AI-generated report text
    pub report: String,
    /// Raw live-data payload from the analysis service, kept verbatim
    pub live_data: serde_json::Value,
    pub generated_at: DateTime<Utc>,
}

/// Structured degraded response returned when the analysis service is
/// unavailable and retries are exhausted. Never raised as an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DegradedReport {
    pub ticker: String,
    /// Short machine-loggable reason
    pub reason: String,
    /// User-facing explanation of the outage
    pub report: String,
    pub generated_at: DateTime<Utc>,
}

impl DegradedReport {
    /// Build the standard outage response for a ticker
    pub fn service_outage(ticker: &str, reason: &str) -> Self {
        let report = format!(
            "Stock Analysis Temporarily Unavailable\n\n\
             We're experiencing high demand or technical issues with our analysis service.\n\n\
             What you can do:\n\
             - Try again in 2-3 minutes\n\
             - Check that ticker '{}' is valid\n\
             - Contact support if the issue persists\n\n\
             Error details: {}",
            ticker, reason
        );

        Self {
            ticker: ticker.to_string(),
            reason: reason.to_string(),
            report,
            generated_at: Utc::now(),
        }
    }
}

/// Quick price check result (no full analysis)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceCheck {
    pub ticker: String,
    pub price: Option<f64>,
    pub currency: Option<String>,
}

/// One entry of the trending-stocks ranking: how many analyses were
/// requested for a ticker over the aggregation window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendingStock {
    pub ticker: String,
    pub analysis_count: u64,
}

/// Normalize a user-supplied ticker: trim whitespace, uppercase.
pub fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recommendation_buy_from_strong_buy() {
        let rec = Recommendation::from_report_text("Verdict: STRONG BUY on fundamentals");
        assert_eq!(rec, Recommendation::Buy);
    }

    #[test]
    fn recommendation_sell_from_avoid() {
        let rec = Recommendation::from_report_text("We would avoid this name for now");
        assert_eq!(rec, Recommendation::Sell);
    }

    #[test]
    fn recommendation_defaults_to_hold() {
        assert_eq!(Recommendation::from_report_text(""), Recommendation::Hold);
        assert_eq!(
            Recommendation::from_report_text("Neutral outlook, fairly valued"),
            Recommendation::Hold
        );
    }

    #[test]
    fn recommendation_dont_buy_is_not_buy() {
        let rec = Recommendation::from_report_text("DON'T BUY at these levels");
        assert_eq!(rec, Recommendation::Hold);
    }

    #[test]
    fn ticker_normalization() {
        assert_eq!(normalize_ticker("  aapl "), "AAPL");
        assert_eq!(normalize_ticker("reliance.ns"), "RELIANCE.NS");
    }

    #[test]
    fn degraded_report_names_ticker() {
        let degraded = DegradedReport::service_outage("TSLA", "connection refused");
        assert_eq!(degraded.ticker, "TSLA");
        assert!(degraded.report.contains("TSLA"));
        assert!(degraded.report.contains("connection refused"));
    }
}
