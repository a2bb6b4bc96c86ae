use crate::error::ConfigError;
use core_types::{MAX_HORIZON, MIN_HISTORY, StrategyKind};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
///
/// Every section falls back to its defaults, so an empty (or absent) file
/// yields a runnable configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub market_data: MarketDataConfig,
    pub dispatcher: DispatcherConfig,
    pub logging: LoggingConfig,
    pub strategies: StrategiesConfig,
}

impl Config {
    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatcher.worker_threads == 0 {
            return Err(ConfigError::ValidationError(
                "dispatcher.worker_threads must be at least 1".to_string(),
            ));
        }
        if self.dispatcher.min_history < MIN_HISTORY {
            return Err(ConfigError::ValidationError(format!(
                "dispatcher.min_history must be at least {}",
                MIN_HISTORY
            )));
        }
        let max_horizon = self.dispatcher.max_horizon_days as usize;
        if max_horizon == 0 || max_horizon > MAX_HORIZON {
            return Err(ConfigError::ValidationError(format!(
                "dispatcher.max_horizon_days must be between 1 and {}",
                MAX_HORIZON
            )));
        }
        if self.dispatcher.default_horizon_days == 0
            || self.dispatcher.default_horizon_days > self.dispatcher.max_horizon_days
        {
            return Err(ConfigError::ValidationError(
                "dispatcher.default_horizon_days must be between 1 and dispatcher.max_horizon_days"
                    .to_string(),
            ));
        }
        self.strategies.validate()
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::ValidationError(format!("Invalid server address: {}", e)))
    }
}

/// Settings for the market-data collaborator.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    pub base_url: String,
    /// History fetched for model training (e.g. "2y").
    pub training_range: String,
    /// History served by the market endpoint (e.g. "5y").
    pub market_range: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://query1.finance.yahoo.com".to_string(),
            training_range: "2y".to_string(),
            market_range: "5y".to_string(),
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (compatible; foresight/0.1)".to_string(),
        }
    }
}

/// Contains parameters for the request dispatcher and its worker pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Number of concurrent blocking jobs (fetches and model fits).
    pub worker_threads: usize,
    /// Minimum normalized series length before any strategy may run.
    /// May be raised above the built-in 60 rows, never lowered.
    pub min_history: usize,
    pub default_horizon_days: u32,
    /// Requests asking for more days are rejected as bad requests.
    pub max_horizon_days: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_threads: 3,
            min_history: MIN_HISTORY,
            default_horizon_days: 7,
            max_horizon_days: 365,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs are also written to a daily rolling file here.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            directory: None,
            file_prefix: "foresight.log".to_string(),
        }
    }
}

/// Contains the parameter sets for all forecasting strategies.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StrategiesConfig {
    /// Strategy names (canonical or alias) to mark unavailable at startup.
    pub disabled: Vec<String>,
    pub arima: ArimaParams,
    pub gradient_boosting: GradientBoostingParams,
    pub prophet: ProphetParams,
    pub lstm: LstmParams,
    pub tft: TftParams,
}

impl StrategiesConfig {
    /// Resolves the `disabled` list into strategy kinds.
    pub fn disabled_kinds(&self) -> Result<Vec<StrategyKind>, ConfigError> {
        self.disabled
            .iter()
            .map(|name| {
                name.parse::<StrategyKind>()
                    .map_err(|e| ConfigError::ValidationError(format!("strategies.disabled: {}", e)))
            })
            .collect()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.disabled_kinds()?;

        if self.arima.ar_order == 0 {
            return invalid("strategies.arima.ar_order must be at least 1");
        }
        let gb = &self.gradient_boosting;
        if gb.lags == 0 || gb.n_estimators == 0 || gb.max_depth == 0 {
            return invalid("strategies.gradient_boosting lags, n_estimators and max_depth must be positive");
        }
        if !(gb.learning_rate > 0.0 && gb.learning_rate <= 1.0) {
            return invalid("strategies.gradient_boosting.learning_rate must be in (0, 1]");
        }
        let prophet = &self.prophet;
        if !(prophet.changepoint_range > 0.0 && prophet.changepoint_range <= 1.0) {
            return invalid("strategies.prophet.changepoint_range must be in (0, 1]");
        }
        if prophet.changepoint_prior_scale <= 0.0 || prophet.seasonality_prior_scale <= 0.0 {
            return invalid("strategies.prophet prior scales must be positive");
        }
        let lstm = &self.lstm;
        if lstm.window == 0 || lstm.hidden_units == 0 || lstm.dense_units == 0 {
            return invalid("strategies.lstm window and layer widths must be positive");
        }
        if lstm.epochs == 0 || lstm.batch_size == 0 {
            return invalid("strategies.lstm epochs and batch_size must be positive");
        }
        let tft = &self.tft;
        if tft.heads == 0 || tft.d_model == 0 || tft.d_model % tft.heads != 0 {
            return invalid("strategies.tft.d_model must be a positive multiple of heads");
        }
        if tft.layers == 0 || tft.epochs == 0 || tft.feed_forward == 0 {
            return invalid("strategies.tft layers, epochs and feed_forward must be positive");
        }
        Ok(())
    }
}

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.to_string()))
}

/// Parameters for the ARIMA(p, d, 0) strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArimaParams {
    pub ar_order: usize,
    pub differencing: usize,
}

impl Default for ArimaParams {
    fn default() -> Self {
        Self {
            ar_order: 5,
            differencing: 1,
        }
    }
}

/// Parameters for the lagged-feature gradient boosting strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GradientBoostingParams {
    pub lags: usize,
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: u16,
    /// Rows required after dropping incomplete lag features.
    pub min_rows: usize,
}

impl Default for GradientBoostingParams {
    fn default() -> Self {
        Self {
            lags: 3,
            n_estimators: 100,
            learning_rate: 0.3,
            max_depth: 6,
            min_rows: 10,
        }
    }
}

/// Parameters for the additive trend + seasonality strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProphetParams {
    pub n_changepoints: usize,
    /// Share of the history in which changepoints may be placed.
    pub changepoint_range: f64,
    pub changepoint_prior_scale: f64,
    pub seasonality_prior_scale: f64,
    pub daily_seasonality: bool,
    pub weekly_seasonality: bool,
    /// Only applied when at least two years of history are present.
    pub yearly_seasonality: bool,
}

impl Default for ProphetParams {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            daily_seasonality: true,
            weekly_seasonality: true,
            yearly_seasonality: true,
        }
    }
}

/// Parameters for the recurrent sequence network.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LstmParams {
    pub window: usize,
    pub hidden_units: usize,
    pub dense_units: usize,
    /// One epoch trades accuracy for response time.
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Fixed seed for weight initialisation; random when unset.
    pub seed: Option<u64>,
}

impl Default for LstmParams {
    fn default() -> Self {
        Self {
            window: 60,
            hidden_units: 50,
            dense_units: 25,
            epochs: 1,
            batch_size: 32,
            learning_rate: 0.001,
            seed: None,
        }
    }
}

/// Parameters for the causal attention network.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TftParams {
    pub d_model: usize,
    pub heads: usize,
    pub layers: usize,
    pub feed_forward: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
}

impl Default for TftParams {
    fn default() -> Self {
        Self {
            d_model: 16,
            heads: 4,
            layers: 2,
            feed_forward: 64,
            epochs: 20,
            learning_rate: 0.005,
            seed: 42,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.dispatcher.worker_threads, 3);
        assert_eq!(config.dispatcher.min_history, 60);
        assert_eq!(config.strategies.tft.seed, 42);
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = Config::default();
        config.dispatcher.worker_threads = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn min_history_cannot_drop_below_sixty_rows() {
        let mut config = Config::default();
        config.dispatcher.min_history = 59;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
        config.dispatcher.min_history = 120;
        config.validate().unwrap();
    }

    #[test]
    fn horizon_limits_are_checked() {
        let mut config = Config::default();
        config.dispatcher.max_horizon_days = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.dispatcher.max_horizon_days = (MAX_HORIZON + 1) as u32;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        config.dispatcher.max_horizon_days = 30;
        config.dispatcher.default_horizon_days = 31;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn indivisible_attention_width_is_rejected() {
        let mut config = Config::default();
        config.strategies.tft.d_model = 18;
        assert!(config.validate().is_err());
    }

    #[test]
    fn disabled_names_resolve_through_aliases() {
        let strategies = StrategiesConfig {
            disabled: vec!["LSTM".into(), "gradient-boosted-trees".into()],
            ..Default::default()
        };
        assert_eq!(
            strategies.disabled_kinds().unwrap(),
            vec![StrategyKind::SequenceNetwork, StrategyKind::GradientBoostedTrees]
        );
    }

    #[test]
    fn unknown_disabled_name_is_rejected() {
        let mut config = Config::default();
        config.strategies.disabled = vec!["foo".into()];
        assert!(config.validate().is_err());
    }
}
