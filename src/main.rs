use api_client::{JsonFileSource, MarketDataSource, YahooClient};
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Color, Table};
use configuration::{Config, LogFormat};
use dispatcher::{Dispatcher, DispatcherSettings, ForecastRequest};
use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use strategies::StrategyRegistry;

/// The main entry point for the Foresight forecasting service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Environment overrides may live in a .env file; it is optional.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = configuration::load_config(cli.config.as_deref())?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    let _guard = configuration::init_tracing(&config.logging)?;

    let source = build_source(&config, cli.data_dir)?;

    match cli.command {
        Commands::Serve => web_server::run_server(config, Some(source)).await,
        Commands::Forecast(args) => handle_forecast(&config, source, args).await,
        Commands::Compare(args) => handle_compare(&config, source, args).await,
        Commands::Strategies => {
            handle_strategies(&config);
            Ok(())
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Multi-strategy stock price forecasting.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (default: ./foresight.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Read price history from `<DIR>/<TICKER>.json` instead of the network.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Overrides the configured log output format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP service.
    Serve,
    /// Run one strategy for one ticker.
    Forecast(ForecastArgs),
    /// Run every available strategy for one ticker side by side.
    Compare(CompareArgs),
    /// List strategies and whether they can run in this build.
    Strategies,
}

#[derive(Parser)]
struct ForecastArgs {
    /// Strategy name or alias (e.g. "arima", "gradient-boosted-trees").
    #[arg(long)]
    strategy: String,

    /// The ticker to forecast (e.g. "AAPL").
    #[arg(long)]
    ticker: String,

    /// Number of days ahead (default from configuration).
    #[arg(long)]
    days: Option<i64>,
}

#[derive(Parser)]
struct CompareArgs {
    #[arg(long)]
    ticker: String,

    #[arg(long)]
    days: Option<i64>,
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn build_source(config: &Config, data_dir: Option<PathBuf>) -> anyhow::Result<Arc<dyn MarketDataSource>> {
    Ok(match data_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "Reading price history from local files.");
            Arc::new(JsonFileSource::new(dir))
        }
        None => Arc::new(YahooClient::new(&config.market_data)?),
    })
}

fn build_dispatcher(config: &Config, source: Arc<dyn MarketDataSource>) -> Dispatcher {
    let registry = StrategyRegistry::from_config(&config.strategies);
    Dispatcher::new(Arc::new(registry), source, DispatcherSettings::from_config(config))
}

fn horizon(config: &Config, days: Option<i64>) -> i64 {
    days.unwrap_or(i64::from(config.dispatcher.default_horizon_days))
}

async fn handle_forecast(
    config: &Config,
    source: Arc<dyn MarketDataSource>,
    args: ForecastArgs,
) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(config, source);
    let response = dispatcher
        .forecast(ForecastRequest {
            strategy_name: args.strategy,
            ticker: args.ticker,
            horizon_days: horizon(config, args.days),
        })
        .await?;

    println!("{} forecast for {}", response.strategy, response.ticker);
    let mut table = Table::new();
    table.set_header(vec!["Day", "Forecast"]);
    for (day, value) in response.forecast.iter().enumerate() {
        table.add_row(vec![Cell::new(day + 1), Cell::new(format!("{:.2}", value))]);
    }
    println!("{table}");
    Ok(())
}

/// Runs every available strategy concurrently; the worker pool bounds how
/// many actually execute at once.
async fn handle_compare(
    config: &Config,
    source: Arc<dyn MarketDataSource>,
    args: CompareArgs,
) -> anyhow::Result<()> {
    let dispatcher = build_dispatcher(config, source);
    let days = horizon(config, args.days);
    let kinds = dispatcher.registry().available_kinds();
    if kinds.is_empty() {
        anyhow::bail!("no strategies are available in this build");
    }

    let tasks = kinds.iter().map(|kind| {
        dispatcher.forecast(ForecastRequest {
            strategy_name: kind.alias().to_string(),
            ticker: args.ticker.clone(),
            horizon_days: days,
        })
    });
    let results = join_all(tasks).await;

    let mut columns = Vec::new();
    let mut failures = Vec::new();
    for (kind, result) in kinds.iter().zip(results) {
        match result {
            Ok(response) => columns.push((kind.alias(), response.forecast)),
            Err(e) => failures.push((kind.alias(), e)),
        }
    }

    let mut table = Table::new();
    let mut header = vec![Cell::new("Day")];
    header.extend(columns.iter().map(|(name, _)| Cell::new(name)));
    table.set_header(header);
    let rows = columns.iter().map(|(_, values)| values.len()).max().unwrap_or(0);
    for day in 0..rows {
        let mut row = vec![Cell::new(day + 1)];
        row.extend(columns.iter().map(|(_, values)| {
            values
                .get(day)
                .map_or_else(|| Cell::new("-"), |v| Cell::new(format!("{:.2}", v)))
        }));
        table.add_row(row);
    }
    println!("{} forecast comparison", args.ticker.trim().to_uppercase());
    println!("{table}");

    for (name, error) in failures {
        println!("{} failed ({}): {}", name, error.category(), error);
    }
    Ok(())
}

fn handle_strategies(config: &Config) {
    let registry = StrategyRegistry::from_config(&config.strategies);
    let mut table = Table::new();
    table.set_header(vec!["Strategy", "Alias", "Status", "Reason"]);
    for status in registry.availability() {
        let state = if status.available {
            Cell::new("available").fg(Color::Green)
        } else {
            Cell::new("unavailable").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(status.name),
            Cell::new(status.alias),
            state,
            Cell::new(status.reason.unwrap_or_default()),
        ]);
    }
    println!("{table}");
}
