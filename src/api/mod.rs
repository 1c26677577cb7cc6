pub mod client;

pub use client::*;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::DashboardResult;
use crate::types::{AnalysisResult, FetchResponse};

/// Request/response boundary to the external regime-analysis service.
///
/// Every call is one-shot: no retries, no pagination.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegimeService: Send + Sync {
    async fn list_datasets(&self) -> DashboardResult<Vec<String>>;
    async fn fetch_market_data(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DashboardResult<FetchResponse>;
    async fn analyze(&self, filename: &str) -> DashboardResult<AnalysisResult>;
}
