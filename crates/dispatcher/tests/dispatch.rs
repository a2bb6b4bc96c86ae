use api_client::InMemorySource;
use chrono::NaiveDate;
use configuration::StrategiesConfig;
use core_types::{Bar, StrategyKind, TimeSeries};
use dispatcher::{
    DispatchError, Dispatcher, DispatcherSettings, ErrorCategory, ForecastRequest,
};
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use strategies::{Forecast, ForecastStrategy, StrategyError, StrategyRegistry};

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Values,
    Empty,
    Fail,
    Invalid,
    Panic,
}

/// A strategy that records how often it runs and behaves as instructed.
struct Stub {
    kind: StrategyKind,
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

impl ForecastStrategy for Stub {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<Forecast, StrategyError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last = series.closes().last().copied().unwrap_or_default();
        match self.behaviour {
            Behaviour::Values => Ok(Forecast::Values(vec![last; horizon])),
            Behaviour::Empty => Ok(Forecast::Empty),
            Behaviour::Fail => Err(StrategyError::Execution("matrix is singular".into())),
            Behaviour::Invalid => Err(StrategyError::InvalidInput("negative prices".into())),
            Behaviour::Panic => panic!("stub strategy panicked"),
        }
    }
}

fn bars(len: usize) -> Vec<Bar> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    (0..len)
        .map(|i| {
            let t = i as f64;
            Bar::from_close(start + chrono::Days::new(i as u64), 50.0 + 0.1 * t + (t / 5.0).sin())
        })
        .collect()
}

fn source() -> Arc<InMemorySource> {
    Arc::new(
        InMemorySource::new()
            .with_bars("ACME", bars(300))
            .with_bars("SHORT", bars(59))
            .with_bars("EDGE", bars(60))
            .with_bars("HOLLOW", Vec::new()),
    )
}

fn stub_dispatcher(behaviour: Behaviour) -> (Dispatcher, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = StrategyRegistry::empty()
        .with_strategy(Arc::new(Stub {
            kind: StrategyKind::GradientBoostedTrees,
            behaviour,
            calls: Arc::clone(&calls),
        }))
        .with_unavailable(StrategyKind::SequenceNetwork, "candle backend missing");
    let dispatcher = Dispatcher::new(Arc::new(registry), source(), DispatcherSettings::default());
    (dispatcher, calls)
}

fn request(strategy: &str, ticker: &str, days: i64) -> ForecastRequest {
    ForecastRequest {
        strategy_name: strategy.to_string(),
        ticker: ticker.to_string(),
        horizon_days: days,
    }
}

#[tokio::test]
async fn acme_gradient_boosted_trees_end_to_end() {
    let registry = StrategyRegistry::from_config(&StrategiesConfig::default());
    let dispatcher = Dispatcher::new(Arc::new(registry), source(), DispatcherSettings::default());

    let response = dispatcher
        .forecast(request("gradient-boosted-trees", "acme", 5))
        .await
        .unwrap();

    assert_eq!(response.strategy, "gradient-boosted-trees");
    assert_eq!(response.ticker, "ACME");
    assert_eq!(response.forecast.len(), 5);
    assert!(response.forecast.iter().all(|v| v.is_finite()));
}

#[tokio::test]
async fn unknown_ticker_is_not_found_and_runs_nothing() {
    let (dispatcher, calls) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher
        .forecast(request("xgboost", "UNKNOWN1", 7))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::TickerNotFound(ref t) if t == "UNKNOWN1"));
    assert_eq!(err.category(), ErrorCategory::NotFound);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ticker_with_no_bars_is_not_found() {
    let (dispatcher, _) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher.forecast(request("xgboost", "HOLLOW", 7)).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}

#[tokio::test]
async fn unavailable_strategy_is_not_implemented() {
    let (dispatcher, calls) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher.forecast(request("lstm", "ACME", 7)).await.unwrap_err();

    assert_eq!(err.category(), ErrorCategory::NotImplemented);
    assert!(err.to_string().contains("candle backend missing"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn short_series_is_rejected_before_any_strategy_runs() {
    let (dispatcher, calls) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher.forecast(request("xgboost", "SHORT", 7)).await.unwrap_err();

    assert!(matches!(err, DispatchError::InsufficientData { required: 60, actual: 59 }));
    assert_eq!(err.category(), ErrorCategory::BadRequest);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Exactly the minimum is accepted.
    let response = dispatcher.forecast(request("xgboost", "EDGE", 2)).await.unwrap();
    assert_eq!(response.forecast.len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[rstest]
#[case("foo")]
#[case("")]
#[case("gradient boosted trees")]
#[tokio::test]
async fn unknown_strategy_names_are_bad_requests(#[case] name: &str) {
    let (dispatcher, calls) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher.forecast(request(name, "ACME", 7)).await.unwrap_err();
    assert!(matches!(err, DispatchError::UnknownStrategy(_)));
    assert_eq!(err.category(), ErrorCategory::BadRequest);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case("LSTM")]
#[case("lstm")]
#[case("Lstm")]
#[tokio::test]
async fn strategy_names_resolve_case_insensitively(#[case] name: &str) {
    let (dispatcher, _) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher.forecast(request(name, "ACME", 7)).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotImplemented);
}

#[tokio::test]
async fn response_echoes_lowercased_strategy_name() {
    let (dispatcher, _) = stub_dispatcher(Behaviour::Values);
    let response = dispatcher.forecast(request("XGBoost", " acme ", 3)).await.unwrap();
    assert_eq!(response.strategy, "xgboost");
    assert_eq!(response.ticker, "ACME");
    assert_eq!(response.forecast.len(), 3);
}

#[rstest]
#[case(0)]
#[case(-4)]
#[tokio::test]
async fn non_positive_horizon_is_a_bad_request(#[case] days: i64) {
    let (dispatcher, calls) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher.forecast(request("xgboost", "ACME", days)).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidInput(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[rstest]
#[case(366)]
#[case(1 << 40)]
#[case(i64::MAX)]
#[tokio::test]
async fn horizon_above_the_configured_maximum_is_a_bad_request(#[case] days: i64) {
    let (dispatcher, calls) = stub_dispatcher(Behaviour::Values);
    let err = dispatcher.forecast(request("xgboost", "ACME", days)).await.unwrap_err();
    assert!(matches!(err, DispatchError::InvalidInput(ref m) if m.contains("at most 365")));
    assert_eq!(err.category(), ErrorCategory::BadRequest);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let response = dispatcher.forecast(request("xgboost", "ACME", 365)).await.unwrap();
    assert_eq!(response.forecast.len(), 365);
}

#[rstest]
#[case(Behaviour::Empty, ErrorCategory::Internal)]
#[case(Behaviour::Fail, ErrorCategory::Internal)]
#[case(Behaviour::Invalid, ErrorCategory::BadRequest)]
#[case(Behaviour::Panic, ErrorCategory::Internal)]
#[tokio::test]
async fn strategy_outcomes_are_reclassified(#[case] behaviour: Behaviour, #[case] expected: ErrorCategory) {
    let (dispatcher, calls) = stub_dispatcher(behaviour);
    let err = dispatcher.forecast(request("xgboost", "ACME", 7)).await.unwrap_err();
    assert_eq!(err.category(), expected);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn execution_failures_keep_their_message() {
    let (dispatcher, _) = stub_dispatcher(Behaviour::Fail);
    let err = dispatcher.forecast(request("xgboost", "ACME", 7)).await.unwrap_err();
    assert!(matches!(err, DispatchError::StrategyExecution(ref m) if m == "matrix is singular"));
}

#[tokio::test]
async fn empty_forecast_is_distinct_from_failure() {
    let (dispatcher, _) = stub_dispatcher(Behaviour::Empty);
    let err = dispatcher.forecast(request("xgboost", "ACME", 7)).await.unwrap_err();
    assert!(matches!(err, DispatchError::EmptyForecast));
    assert_eq!(err.to_string(), "Model produced no predictions");
}

#[tokio::test]
async fn pool_permits_are_returned_after_failures() {
    let (dispatcher, _) = stub_dispatcher(Behaviour::Panic);
    let _ = dispatcher.forecast(request("xgboost", "ACME", 7)).await;
    assert_eq!(dispatcher.pool().idle(), dispatcher.pool().size());
}

#[tokio::test]
async fn market_history_is_sorted_and_reports_missing_tickers() {
    let mut shuffled = bars(5);
    shuffled.reverse();
    let source = Arc::new(InMemorySource::new().with_bars("ACME", shuffled));
    let dispatcher = Dispatcher::new(
        Arc::new(StrategyRegistry::empty()),
        source,
        DispatcherSettings::default(),
    );

    let history = dispatcher.market_history("acme").await.unwrap();
    assert_eq!(history.ticker, "ACME");
    assert!(history.bars.windows(2).all(|w| w[0].date < w[1].date));

    let err = dispatcher.market_history("NOPE").await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
}
