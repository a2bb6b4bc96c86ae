use crate::error::ApiError;
use async_trait::async_trait;
use configuration::MarketDataConfig;
use core_types::Bar;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;
use std::time::Duration;

pub mod error;
pub mod responses;
pub mod sources;
// --- Public API ---
pub use responses::{ChartResponse, display_exchange};
pub use sources::{InMemorySource, JsonFileSource};

/// Descriptive metadata about a listed instrument.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentMeta {
    pub name: String,
    pub exchange: String,
    pub currency: String,
}

impl InstrumentMeta {
    /// Metadata used when a source knows nothing beyond the ticker.
    pub fn fallback(ticker: &str) -> Self {
        Self {
            name: ticker.to_uppercase(),
            exchange: "MARKET".to_string(),
            currency: "USD".to_string(),
        }
    }
}

/// Raw daily history for one ticker, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub ticker: String,
    pub meta: InstrumentMeta,
    pub bars: Vec<Bar>,
}

/// The generic, abstract interface for a source of historical prices.
/// This trait is the contract the dispatcher uses, allowing the network
/// client to be swapped for local files or fixed in-memory data.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetches daily bars covering `range` (e.g. "2y", "5y").
    ///
    /// `Ok(None)` means the ticker is unknown to the source.
    async fn fetch_history(&self, ticker: &str, range: &str) -> Result<Option<PriceHistory>, ApiError>;
}

/// A concrete implementation of `MarketDataSource` backed by the public
/// chart API.
#[derive(Clone)]
pub struct YahooClient {
    client: reqwest::Client,
    base_url: String,
}

impl YahooClient {
    pub fn new(config: &MarketDataConfig) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| ApiError::InvalidData(format!("Invalid user agent: {}", e)))?,
        );

        Ok(Self {
            client: reqwest::Client::builder()
                .default_headers(headers)
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MarketDataSource for YahooClient {
    async fn fetch_history(&self, ticker: &str, range: &str) -> Result<Option<PriceHistory>, ApiError> {
        let ticker = ticker.trim().to_uppercase();
        let url = format!("{}/v8/finance/chart/{}", self.base_url, ticker);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("range", range),
                ("interval", "1d"),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!(%ticker, "Chart API reported unknown ticker.");
            return Ok(None);
        }
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Upstream(format!("HTTP {} for {}: {}", status, ticker, text)));
        }

        let body: ChartResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialization(e.to_string()))?;

        if let Some(error) = body.chart.error {
            return Err(ApiError::Upstream(format!(
                "{}: {}",
                error.code,
                error.description.unwrap_or_default()
            )));
        }

        let result = body.chart.result.and_then(|results| results.into_iter().next());
        match result {
            Some(result) if !result.timestamp.is_empty() => {
                let history = result.into_history(&ticker)?;
                tracing::debug!(%ticker, bars = history.bars.len(), "Fetched price history.");
                Ok(Some(history))
            }
            _ => Ok(None),
        }
    }
}
