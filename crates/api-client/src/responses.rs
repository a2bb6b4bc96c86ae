use crate::error::ApiError;
use crate::{InstrumentMeta, PriceHistory};
use chrono::DateTime;
use core_types::Bar;
use serde::Deserialize;

// Using `#[serde(rename_all = "camelCase")]` to automatically map from JSON camelCase to Rust snake_case.

/// The envelope of a `GET /v8/finance/chart/{ticker}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: Chart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chart {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ChartError>,
}

/// Represents an error reported inside the chart envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    pub meta: ChartMeta,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub exchange_name: Option<String>,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    /// Seconds east of UTC for the listing exchange.
    #[serde(default)]
    pub gmtoffset: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Indicators {
    #[serde(default)]
    pub quote: Vec<Quote>,
    #[serde(default)]
    pub adjclose: Vec<AdjClose>,
}

/// Parallel arrays indexed like `ChartResult::timestamp`. Gaps are `null`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Quote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<u64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

/// Maps the chart API's exchange codes to display names.
pub fn display_exchange(raw: Option<&str>) -> String {
    match raw {
        Some("NSI") => "NSE".to_string(),
        Some("NMS") => "NASDAQ".to_string(),
        Some("NYQ") => "NYSE".to_string(),
        Some("PNK") => "OTC".to_string(),
        Some("GER") => "XETRA".to_string(),
        Some("PAR") => "EURONEXT".to_string(),
        Some(other) => other.to_string(),
        None => "MARKET".to_string(),
    }
}

impl ChartResult {
    /// Converts the parallel arrays into dated bars.
    ///
    /// Timestamps are shifted into exchange local time before the calendar
    /// date is taken. When an adjusted close is present every price of the
    /// bar is scaled by `adjclose / close`.
    pub fn into_history(self, ticker: &str) -> Result<PriceHistory, ApiError> {
        let quote = self.indicators.quote.into_iter().next().unwrap_or_default();
        let adjclose = self
            .indicators
            .adjclose
            .into_iter()
            .next()
            .unwrap_or_default()
            .adjclose;

        let value_at = |values: &[Option<f64>], i: usize| values.get(i).copied().flatten();

        let bars = self
            .timestamp
            .iter()
            .enumerate()
            .map(|(i, ts)| {
                let date = DateTime::from_timestamp(ts + self.meta.gmtoffset, 0)
                    .ok_or_else(|| ApiError::InvalidData(format!("Invalid timestamp: {}", ts)))?
                    .date_naive();

                let close = value_at(&quote.close, i);
                let factor = match (close, value_at(&adjclose, i)) {
                    (Some(close), Some(adjusted)) if close != 0.0 => adjusted / close,
                    _ => 1.0,
                };
                let adjust = |value: Option<f64>| value.map(|v| v * factor);

                Ok(Bar {
                    date,
                    open: adjust(value_at(&quote.open, i)),
                    high: adjust(value_at(&quote.high, i)),
                    low: adjust(value_at(&quote.low, i)),
                    close: adjust(close),
                    volume: quote.volume.get(i).copied().flatten(),
                })
            })
            .collect::<Result<Vec<Bar>, ApiError>>()?;

        let ticker = ticker.to_uppercase();
        let meta = InstrumentMeta {
            name: self
                .meta
                .long_name
                .or(self.meta.short_name)
                .unwrap_or_else(|| ticker.clone()),
            exchange: display_exchange(self.meta.exchange_name.as_deref()),
            currency: self.meta.currency.unwrap_or_else(|| "USD".to_string()),
        };

        Ok(PriceHistory { ticker, meta, bars })
    }
}
