//! Tracing subscriber setup shared by the CLI and the web server.

use crate::error::ConfigError;
use crate::settings::{LogFormat, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins over `config.level`. When `config.directory` is set a
/// daily rolling file is written as well; the returned guard must be held
/// for the lifetime of the process so buffered lines are flushed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    let console = tracing_subscriber::fmt::layer().with_timer(LocalTime::rfc_3339());
    let mut layers: Vec<BoxedLayer> = vec![match config.format {
        LogFormat::Pretty => console.pretty().boxed(),
        LogFormat::Compact => console.compact().boxed(),
        LogFormat::Json => console.json().boxed(),
    }];

    let guard = match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_timer(LocalTime::rfc_3339())
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ConfigError::LoggingError(e.to_string()))?;

    tracing::info!(
        level = %config.level,
        format = ?config.format,
        directory = ?config.directory,
        "Logging initialised."
    );
    Ok(guard)
}
