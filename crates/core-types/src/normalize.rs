//! Conversion of raw fetched data into the canonical [`TimeSeries`] form.
//!
//! Every strategy consumes the output of this module, so all cleaning happens
//! here: rows with unparseable dates or missing prices are dropped, dates are
//! reduced to calendar days with any timezone stripped, the series is sorted
//! ascending, and the minimum length is enforced.

use crate::error::CoreError;
use crate::structs::{Bar, PricePoint, TimeSeries};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

/// The strategy-independent minimum series length.
pub const MIN_HISTORY: usize = 60;

/// The longest forecast, in steps, any strategy will produce.
pub const MAX_HORIZON: usize = 3650;

/// Candidate names for the date column, in order of preference.
const DATE_COLUMNS: [&str; 4] = ["date", "datetime", "timestamp", "ds"];
/// Candidate names for the closing price column, in order of preference.
const CLOSE_COLUMNS: [&str; 3] = ["close", "adj close", "adj_close"];

/// Epoch values above this are taken to be milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    min_length: usize,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(MIN_HISTORY)
    }
}

impl Normalizer {
    pub fn new(min_length: usize) -> Self {
        Self { min_length }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Fails with [`CoreError::InsufficientData`] when the series is shorter
    /// than the configured minimum.
    pub fn ensure_sufficient(&self, series: &TimeSeries) -> Result<(), CoreError> {
        if series.len() < self.min_length {
            return Err(CoreError::InsufficientData {
                required: self.min_length,
                actual: series.len(),
            });
        }
        Ok(())
    }

    /// Normalizes typed bars from a market-data source.
    pub fn normalize_bars(&self, bars: &[Bar]) -> Result<TimeSeries, CoreError> {
        let points = bars
            .iter()
            .filter_map(|bar| match bar.close {
                Some(close) if close.is_finite() => Some(PricePoint { date: bar.date, close }),
                _ => None,
            })
            .collect();

        let series = TimeSeries::from_points(points);
        tracing::debug!(
            input_rows = bars.len(),
            kept_rows = series.len(),
            "Normalized bar series."
        );
        self.ensure_sufficient(&series)?;
        Ok(series)
    }

    /// Normalizes loosely typed tabular records (one JSON object per row).
    ///
    /// Column names are matched after lower-casing, so `Date`/`Close` and
    /// `date`/`close` are equivalent.
    pub fn normalize_records(&self, records: &[Map<String, Value>]) -> Result<TimeSeries, CoreError> {
        self.normalize_bars(&bars_from_records(records)?)
    }
}

/// Converts tabular records into bars using the normalizer's column rules.
///
/// Rows whose date cannot be parsed are dropped; a missing or non-numeric
/// close is kept as `None` and dropped later by [`Normalizer::normalize_bars`].
pub fn bars_from_records(records: &[Map<String, Value>]) -> Result<Vec<Bar>, CoreError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }
    let date_column =
        resolve_column(records, &DATE_COLUMNS).ok_or_else(|| CoreError::MissingColumn("date".into()))?;
    let close_column =
        resolve_column(records, &CLOSE_COLUMNS).ok_or_else(|| CoreError::MissingColumn("close".into()))?;

    let price = |row: &Map<String, Value>, column: &str| cell(row, column).and_then(parse_price);

    let bars: Vec<Bar> = records
        .iter()
        .filter_map(|row| {
            let date = cell(row, date_column).and_then(parse_date)?;
            Some(Bar {
                date,
                open: price(row, "open"),
                high: price(row, "high"),
                low: price(row, "low"),
                close: price(row, close_column),
                volume: price(row, "volume")
                    .filter(|v| *v >= 0.0)
                    .map(|v| v as u64),
            })
        })
        .collect();

    let dropped = records.len() - bars.len();
    if dropped > 0 {
        tracing::debug!(dropped, "Dropped rows with unparseable dates.");
    }
    Ok(bars)
}

/// The first of `candidates` that names a key in any record, ignoring case.
fn resolve_column(records: &[Map<String, Value>], candidates: &[&'static str]) -> Option<&'static str> {
    candidates.iter().copied().find(|candidate| {
        records
            .iter()
            .any(|row| row.keys().any(|key| key.trim().to_lowercase() == *candidate))
    })
}

/// The value stored under `column` in `row`, ignoring case.
fn cell<'a>(row: &'a Map<String, Value>, column: &str) -> Option<&'a Value> {
    row.iter()
        .find(|(key, _)| key.trim().to_lowercase() == column)
        .map(|(_, value)| value)
}

/// Parses a date-like value into a calendar date, dropping any time of day
/// and timezone offset.
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(raw) => parse_date_str(raw.trim()),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            let secs = if raw.abs() > EPOCH_MILLIS_THRESHOLD { raw / 1000 } else { raw };
            DateTime::from_timestamp(secs, 0).map(|dt| dt.date_naive())
        }
        _ => None,
    }
}

fn parse_date_str(raw: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.date_naive());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.date())
}

fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    price.is_finite().then_some(price)
}
