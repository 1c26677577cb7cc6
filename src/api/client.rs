use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::RegimeService;
use crate::config::ServiceSettings;
use crate::error::{DashboardError, DashboardResult};
use crate::types::{
    AnalysisResult, AnalyzeRequest, ErrorBody, FetchRequest, FetchResponse, FilesResponse,
};

/// HTTP client for the analysis service's `/market` endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(settings: &ServiceSettings) -> DashboardResult<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| DashboardError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> DashboardResult<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let resp = self.client.get(&url).send().await.map_err(network_error)?;
        decode(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> DashboardResult<T> {
        let url = self.url(path);
        debug!("POST {}", url);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        decode(resp).await
    }
}

#[async_trait]
impl RegimeService for ApiClient {
    async fn list_datasets(&self) -> DashboardResult<Vec<String>> {
        let resp: FilesResponse = self.get_json("/market/files").await?;
        debug!("Service reports {} datasets", resp.files.len());
        Ok(resp.files)
    }

    async fn fetch_market_data(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> DashboardResult<FetchResponse> {
        let req = FetchRequest::new(ticker, start_date, end_date);
        info!("Fetching market data for {} from {} to {}", req.ticker, req.start_date, req.end_date);
        let resp: FetchResponse = self.post_json("/market/fetch", &req).await?;
        match &resp.message {
            Some(message) => info!("Market data stored as {} ({})", resp.filename, message),
            None => info!("Market data stored as {}", resp.filename),
        }
        Ok(resp)
    }

    async fn analyze(&self, filename: &str) -> DashboardResult<AnalysisResult> {
        if filename.trim().is_empty() {
            return Err(DashboardError::Validation("No dataset selected".to_string()));
        }

        info!("Requesting regime analysis for {}", filename);
        let req = AnalyzeRequest { filename: filename.to_string() };
        let result: AnalysisResult = self.post_json("/market/analyze", &req).await?;
        info!(
            "Analysis received: {} observations, {} states, current regime {}",
            result.total_days, result.n_states, result.current_regime
        );
        Ok(result)
    }
}

fn network_error(err: reqwest::Error) -> DashboardError {
    DashboardError::Network(err.to_string())
}

/// Maps a response into the error taxonomy: 2xx bodies must decode, other
/// statuses become `Validation` when they carry a detail message.
async fn decode<T: DeserializeOwned>(resp: Response) -> DashboardResult<T> {
    let status = resp.status();
    let bytes = resp.bytes().await.map_err(network_error)?;

    if status.is_success() {
        return serde_json::from_slice(&bytes)
            .map_err(|e| DashboardError::DataShape(format!("unexpected response body: {}", e)));
    }

    let detail = serde_json::from_slice::<ErrorBody>(&bytes)
        .ok()
        .and_then(|body| body.message());

    match detail {
        Some(detail) => {
            warn!("Service rejected request (HTTP {}): {}", status.as_u16(), detail);
            Err(DashboardError::Validation(detail))
        }
        None => {
            warn!("Service returned HTTP {} without detail", status.as_u16());
            Err(DashboardError::Server { status: status.as_u16() })
        }
    }
}
