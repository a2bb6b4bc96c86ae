use api_client::{MarketDataSource, YahooClient};
use axum::{routing::get, Router};
use configuration::Config;
use dispatcher::{Dispatcher, DispatcherSettings};
use std::sync::Arc;
use strategies::StrategyRegistry;
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod handlers;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    /// Horizon used when `days` is omitted from a prediction request.
    pub default_horizon_days: i64,
}

impl AppState {
    /// Builds the registry and dispatcher described by `config` on top of `source`.
    pub fn new(config: &Config, source: Arc<dyn MarketDataSource>) -> Self {
        let registry = StrategyRegistry::from_config(&config.strategies);
        let dispatcher = Dispatcher::new(
            Arc::new(registry),
            source,
            DispatcherSettings::from_config(config),
        );
        Self {
            dispatcher,
            default_horizon_days: i64::from(config.dispatcher.default_horizon_days),
        }
    }
}

/// The application routes, with CORS and request tracing applied.
pub fn app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(Any)
        .allow_headers(AllowHeaders::any());

    Router::new()
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health))
        .route("/api/strategies", get(handlers::get_strategies))
        .route("/api/predict/:strategy/:ticker", get(handlers::get_prediction))
        .route("/api/market/:ticker", get(handlers::get_market_data))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The main function to configure and run the web server.
///
/// `source` defaults to the live chart client when `None`.
pub async fn run_server(config: Config, source: Option<Arc<dyn MarketDataSource>>) -> anyhow::Result<()> {
    let source = match source {
        Some(source) => source,
        None => Arc::new(YahooClient::new(&config.market_data)?),
    };
    let state = Arc::new(AppState::new(&config, source));
    tracing::info!(
        workers = state.dispatcher.pool().size(),
        available = state.dispatcher.registry().available_kinds().len(),
        "Dispatcher ready."
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server listening on http://{}", addr);
    axum::serve(listener, app(state)).await?;

    Ok(())
}
