//! Offline market-data sources.

use crate::error::ApiError;
use crate::{InstrumentMeta, MarketDataSource, PriceHistory};
use async_trait::async_trait;
use core_types::{Bar, bars_from_records};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Reads `<dir>/<TICKER>.json`, a JSON array of row objects with at least a
/// date and a close column. The `range` argument is ignored; files hold
/// whatever history was saved.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl MarketDataSource for JsonFileSource {
    async fn fetch_history(&self, ticker: &str, _range: &str) -> Result<Option<PriceHistory>, ApiError> {
        let ticker = ticker.trim().to_uppercase();
        let path = self.dir.join(format!("{}.json", ticker));

        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let records: Vec<Map<String, Value>> =
            serde_json::from_str(&text).map_err(|e| ApiError::Deserialization(e.to_string()))?;
        let bars = bars_from_records(&records).map_err(|e| ApiError::InvalidData(e.to_string()))?;

        Ok(Some(PriceHistory {
            meta: InstrumentMeta::fallback(&ticker),
            ticker,
            bars,
        }))
    }
}

/// A fixed set of histories keyed by upper-case ticker.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    histories: HashMap<String, Vec<Bar>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.histories.insert(ticker.trim().to_uppercase(), bars);
        self
    }
}

#[async_trait]
impl MarketDataSource for InMemorySource {
    async fn fetch_history(&self, ticker: &str, _range: &str) -> Result<Option<PriceHistory>, ApiError> {
        let ticker = ticker.trim().to_uppercase();
        Ok(self.histories.get(&ticker).map(|bars| PriceHistory {
            meta: InstrumentMeta::fallback(&ticker),
            ticker: ticker.clone(),
            bars: bars.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn file_source_reads_records_and_reports_missing_tickers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("ACME.json"),
            r#"[
                {"Date": "2024-01-03", "Open": 1.0, "Close": 1.5, "Volume": 100},
                {"Date": "2024-01-02", "Open": 2.0, "Close": "2.5"},
                {"Date": "bogus", "Close": 3.0}
            ]"#,
        )
        .unwrap();

        let source = JsonFileSource::new(dir.path());
        let history = source.fetch_history("acme", "2y").await.unwrap().unwrap();
        assert_eq!(history.ticker, "ACME");
        assert_eq!(history.meta.exchange, "MARKET");
        assert_eq!(history.bars.len(), 2);
        assert_eq!(history.bars[0].open, Some(1.0));
        assert_eq!(history.bars[0].volume, Some(100));
        assert_eq!(history.bars[1].close, Some(2.5));

        assert!(source.fetch_history("NOPE", "2y").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn in_memory_source_is_case_insensitive() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let source = InMemorySource::new().with_bars("Acme", vec![Bar::from_close(date, 1.0)]);

        let history = source.fetch_history(" acme ", "5y").await.unwrap().unwrap();
        assert_eq!(history.ticker, "ACME");
        assert_eq!(history.bars.len(), 1);
        assert!(source.fetch_history("OTHER", "5y").await.unwrap().is_none());
    }
}
