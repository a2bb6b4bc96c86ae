//! Request orchestration for forecasts.
//!
//! A request moves through `received -> fetching -> validating ->
//! predicting -> done`. Fetches and strategy runs are both executed on the
//! bounded [`WorkerPool`], so the async caller only awaits. Every failure is
//! reduced to a [`DispatchError`] with one of four outward categories.

use api_client::{MarketDataSource, PriceHistory};
use configuration::settings::Config;
use core_types::{Normalizer, StrategyKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use strategies::{Forecast, StrategyRegistry, StrategyStatus};
use tracing::Span;
use uuid::Uuid;

pub mod error;
pub mod pool;

pub use error::{DispatchError, ErrorCategory};
pub use pool::{PoolError, WorkerPool};

/// The stage a request has reached, recorded on its tracing span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStage {
    Received,
    Fetching,
    Validating,
    Predicting,
    Done,
}

impl DispatchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Received => "received",
            DispatchStage::Fetching => "fetching",
            DispatchStage::Validating => "validating",
            DispatchStage::Predicting => "predicting",
            DispatchStage::Done => "done",
        }
    }
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRequest {
    pub strategy_name: String,
    pub ticker: String,
    pub horizon_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub strategy: String,
    pub ticker: String,
    pub forecast: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub worker_threads: usize,
    pub min_history: usize,
    /// Largest accepted `horizon_days`.
    pub max_horizon_days: i64,
    /// Lookback requested from the source for model training.
    pub training_range: String,
    /// Lookback requested for raw market history.
    pub market_range: String,
}

impl DispatcherSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_threads: config.dispatcher.worker_threads,
            min_history: config.dispatcher.min_history,
            max_horizon_days: i64::from(config.dispatcher.max_horizon_days),
            training_range: config.market_data.training_range.clone(),
            market_range: config.market_data.market_range.clone(),
        }
    }
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The central orchestrator for forecast requests.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<StrategyRegistry>,
    source: Arc<dyn MarketDataSource>,
    pool: WorkerPool,
    normalizer: Normalizer,
    settings: DispatcherSettings,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<StrategyRegistry>,
        source: Arc<dyn MarketDataSource>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            pool: WorkerPool::new(settings.worker_threads),
            normalizer: Normalizer::new(settings.min_history),
            registry,
            source,
            settings,
        }
    }

    pub fn availability(&self) -> Vec<StrategyStatus> {
        self.registry.availability()
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Runs one forecast request to completion.
    #[tracing::instrument(
        name = "forecast",
        skip(self, request),
        fields(
            request_id = %Uuid::new_v4(),
            strategy = %request.strategy_name,
            ticker = %request.ticker,
            horizon = request.horizon_days,
            stage = tracing::field::Empty,
        )
    )]
    pub async fn forecast(&self, request: ForecastRequest) -> Result<ForecastResponse, DispatchError> {
        let result = self.run(request).await;
        match &result {
            Ok(response) => tracing::info!(values = response.forecast.len(), "Forecast complete."),
            Err(e) if e.category() == ErrorCategory::Internal => {
                tracing::error!(error = ?e, "Forecast failed.");
            }
            Err(e) => tracing::info!(category = %e.category(), error = %e, "Forecast rejected."),
        }
        result
    }

    async fn run(&self, request: ForecastRequest) -> Result<ForecastResponse, DispatchError> {
        enter(DispatchStage::Received);
        let requested = request.strategy_name.trim().to_lowercase();
        let kind: StrategyKind = requested.parse()?;

        let ticker = canonical_ticker(&request.ticker)?;
        if request.horizon_days <= 0 {
            return Err(DispatchError::InvalidInput(format!(
                "days must be a positive integer, got {}",
                request.horizon_days
            )));
        }
        if request.horizon_days > self.settings.max_horizon_days {
            return Err(DispatchError::InvalidInput(format!(
                "days must be at most {}, got {}",
                self.settings.max_horizon_days, request.horizon_days
            )));
        }
        let horizon = usize::try_from(request.horizon_days)
            .map_err(|_| DispatchError::InvalidInput("days is too large".to_string()))?;

        enter(DispatchStage::Fetching);
        let history = self.fetch(&ticker, &self.settings.training_range).await?;

        enter(DispatchStage::Validating);
        let series = self.normalizer.normalize_bars(&history.bars)?;
        tracing::debug!(rows = series.len(), "Series validated.");

        enter(DispatchStage::Predicting);
        let strategy = self.registry.get(kind)?;
        let forecast = self
            .pool
            .run_blocking(move || strategy.forecast(&series, horizon))
            .await??;

        let values = match forecast {
            Forecast::Values(values) => values,
            Forecast::Empty => return Err(DispatchError::EmptyForecast),
        };

        enter(DispatchStage::Done);
        Ok(ForecastResponse {
            strategy: requested,
            ticker,
            forecast: values,
        })
    }

    /// Fetches raw market history over the configured market range.
    #[tracing::instrument(skip(self), fields(request_id = %Uuid::new_v4()))]
    pub async fn market_history(&self, ticker: &str) -> Result<PriceHistory, DispatchError> {
        let ticker = canonical_ticker(ticker)?;
        let mut history = self.fetch(&ticker, &self.settings.market_range).await?;
        history.bars.sort_by_key(|bar| bar.date);
        Ok(history)
    }

    /// Fetches on the pool; no history or no bars means the ticker is unknown.
    async fn fetch(&self, ticker: &str, range: &str) -> Result<PriceHistory, DispatchError> {
        let source = Arc::clone(&self.source);
        let (owned_ticker, owned_range) = (ticker.to_string(), range.to_string());
        let fetched = self
            .pool
            .run_async(async move { source.fetch_history(&owned_ticker, &owned_range).await })
            .await??;

        match fetched {
            Some(history) if !history.bars.is_empty() => {
                tracing::debug!(bars = history.bars.len(), "Fetched history.");
                Ok(history)
            }
            _ => Err(DispatchError::TickerNotFound(ticker.to_string())),
        }
    }
}

fn canonical_ticker(raw: &str) -> Result<String, DispatchError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(DispatchError::InvalidInput("ticker must not be empty".to_string()));
    }
    Ok(ticker)
}

fn enter(stage: DispatchStage) {
    Span::current().record("stage", stage.as_str());
    tracing::debug!(%stage, "Entering stage.");
}
