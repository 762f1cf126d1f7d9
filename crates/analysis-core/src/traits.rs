use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{AnalysisError, AnalysisReport, CallOutcome, PriceCheck, TrendingStock};

/// Identifier assigned to a persisted report by the storage collaborator
pub type ReportId = i64;

/// The downstream AI analysis service, treated as a black box that may
/// fail or time out. Implementations classify their own failures into
/// [`CallOutcome`] variants.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Generate a full analysis report for a ticker
    async fn generate_report(&self, ticker: &str, client_id: &str) -> CallOutcome<AnalysisReport>;

    /// Quick price lookup without a full analysis
    async fn verify_price(&self, ticker: &str) -> CallOutcome<PriceCheck>;

    /// Liveness probe; bypasses resilience machinery
    async fn health(&self) -> bool;
}

/// Aggregate-query collaborator: trending-stock rankings over a window.
/// Shares circuit-breaker state with per-user analysis calls.
#[async_trait]
pub trait TrendingSource: Send + Sync {
    async fn fetch_trending_since(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> CallOutcome<Vec<TrendingStock>>;
}

/// Persistence collaborator. Invoked by the composing application after a
/// successful analysis, never by the gateway on failure paths.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn save_report(
        &self,
        client_id: &str,
        report: &AnalysisReport,
    ) -> Result<ReportId, AnalysisError>;
}
