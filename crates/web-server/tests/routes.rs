use api_client::InMemorySource;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use configuration::Config;
use core_types::Bar;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use web_server::{app, AppState};

fn bars(len: usize) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2022, 6, 1).unwrap();
    (0..len)
        .map(|i| {
            let t = i as f64;
            let close = 120.0 + 0.05 * t + (t / 9.0).cos();
            Bar {
                date: start + chrono::Days::new(i as u64),
                open: Some(close - 0.5),
                high: Some(close + 1.0),
                low: Some(close - 1.0),
                close: Some(close),
                volume: Some(1_000 + i as u64),
            }
        })
        .collect()
}

fn router(config: Config) -> Router {
    let source = Arc::new(
        InMemorySource::new()
            .with_bars("ACME", bars(300))
            .with_bars("TINY", bars(20)),
    );
    app(Arc::new(AppState::new(&config, source)))
}

fn default_router() -> Router {
    let mut config = Config::default();
    config.strategies.disabled = vec!["lstm".to_string()];
    router(config)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::String(
        String::from_utf8_lossy(&bytes).into_owned(),
    ));
    (status, body)
}

#[tokio::test]
async fn root_and_health_respond() {
    let (status, body) = get(default_router(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Service is running");

    let (status, body) = get(default_router(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("OK".into()));
}

#[tokio::test]
async fn strategies_lists_every_kind_with_reasons() {
    let (status, body) = get(default_router(), "/api/strategies").await;
    assert_eq!(status, StatusCode::OK);

    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 5);
    let lstm = list.iter().find(|s| s["alias"] == "lstm").unwrap();
    assert_eq!(lstm["available"], false);
    assert_eq!(lstm["reason"], "disabled by configuration");
    let xgb = list.iter().find(|s| s["alias"] == "xgboost").unwrap();
    assert_eq!(xgb["available"], true);
}

#[tokio::test]
async fn predict_returns_requested_horizon() {
    let (status, body) = get(default_router(), "/api/predict/xgboost/acme?days=4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["strategy"], "xgboost");
    assert_eq!(body["ticker"], "ACME");
    assert_eq!(body["forecast"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn predict_defaults_to_configured_horizon() {
    let mut config = Config::default();
    config.dispatcher.default_horizon_days = 3;
    let (status, body) = get(router(config), "/api/predict/arima/ACME").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["forecast"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn errors_carry_category_and_status() {
    let cases = [
        ("/api/predict/foo/ACME", StatusCode::BAD_REQUEST, "bad_request"),
        ("/api/predict/xgboost/TINY", StatusCode::BAD_REQUEST, "bad_request"),
        ("/api/predict/xgboost/ACME?days=0", StatusCode::BAD_REQUEST, "bad_request"),
        ("/api/predict/xgboost/ACME?days=soon", StatusCode::BAD_REQUEST, "bad_request"),
        ("/api/predict/arima/ACME?days=1099511627776", StatusCode::BAD_REQUEST, "bad_request"),
        ("/api/predict/xgboost/UNKNOWN1", StatusCode::NOT_FOUND, "not_found"),
        ("/api/predict/LSTM/ACME", StatusCode::NOT_IMPLEMENTED, "not_implemented"),
    ];
    for (uri, expected_status, expected_category) in cases {
        let (status, body) = get(default_router(), uri).await;
        assert_eq!(status, expected_status, "{uri}");
        assert_eq!(body["error"]["category"], expected_category, "{uri}");
        assert!(body["error"]["message"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn market_returns_ohlc_records_and_metadata() {
    let (status, body) = get(default_router(), "/api/market/acme").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ticker"], "ACME");
    assert_eq!(body["exchange"], "MARKET");
    assert_eq!(body["currency"], "USD");

    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 300);
    assert_eq!(data[0]["date"], "2022-06-01");
    assert_eq!(data[0]["volume"], 1000);
    assert!(data[0]["open"].is_number());

    let (status, body) = get(default_router(), "/api/market/NOPE").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "No historical data found for NOPE");
}
