use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    ArimaParams, Config, DispatcherConfig, GradientBoostingParams, LogFormat, LoggingConfig,
    LstmParams, MarketDataConfig, ProphetParams, ServerConfig, StrategiesConfig, TftParams,
};

/// File looked up in the working directory when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "foresight.toml";

/// Prefix for environment overrides, e.g. `FORESIGHT__SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "FORESIGHT";

/// Loads the application configuration.
///
/// Sources are layered in order: built-in defaults, then the TOML file, then
/// `FORESIGHT__`-prefixed environment variables. An explicit `path` must
/// exist; the default `foresight.toml` is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let builder = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("strategies.disabled"),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_values_override_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9100

[dispatcher]
worker_threads = 5

[strategies]
disabled = ["tft"]

[strategies.gradient_boosting]
n_estimators = 40
"#
        )
        .unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.dispatcher.worker_threads, 5);
        assert_eq!(config.dispatcher.min_history, 60);
        assert_eq!(config.strategies.gradient_boosting.n_estimators, 40);
        assert_eq!(config.strategies.gradient_boosting.lags, 3);
        assert_eq!(config.strategies.disabled, vec!["tft".to_string()]);
    }

    #[test]
    fn invalid_file_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[dispatcher]\nworker_threads = 0").unwrap();

        let err = load_config(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            load_config(Some(&missing)),
            Err(ConfigError::LoadError(_))
        ));
    }
}
