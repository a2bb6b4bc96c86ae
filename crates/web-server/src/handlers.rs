use crate::{error::AppError, AppState};
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use core_types::Bar;
use dispatcher::{ForecastRequest, ForecastResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use strategies::StrategyStatus;

#[derive(Debug, Deserialize)]
pub struct PredictParams {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MarketResponse {
    pub ticker: String,
    pub name: String,
    pub exchange: String,
    pub currency: String,
    pub data: Vec<Bar>,
}

/// # GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "status": "Service is running" }))
}

/// # GET /api/health
pub async fn health() -> &'static str {
    "OK"
}

/// # GET /api/strategies
/// Lists every strategy with its availability and, if unavailable, why.
pub async fn get_strategies(State(state): State<Arc<AppState>>) -> Json<Vec<StrategyStatus>> {
    Json(state.dispatcher.availability())
}

/// # GET /api/predict/:strategy/:ticker?days=N
pub async fn get_prediction(
    Path((strategy, ticker)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
    params: Result<Query<PredictParams>, QueryRejection>,
) -> Result<Json<ForecastResponse>, AppError> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let request = ForecastRequest {
        strategy_name: strategy,
        ticker,
        horizon_days: params.days.unwrap_or(state.default_horizon_days),
    };
    let response = state.dispatcher.forecast(request).await?;
    Ok(Json(response))
}

/// # GET /api/market/:ticker
/// Raw daily OHLC history with instrument metadata.
pub async fn get_market_data(
    Path(ticker): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<MarketResponse>, AppError> {
    let history = state.dispatcher.market_history(&ticker).await?;
    Ok(Json(MarketResponse {
        ticker: history.ticker,
        name: history.meta.name,
        exchange: history.meta.exchange,
        currency: history.meta.currency,
        data: history.bars,
    }))
}
