use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily OHLCV bar as delivered by a market-data source.
///
/// Any price may be missing; sources report gaps (halted sessions, partial
/// days) as `None` rather than dropping the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<u64>,
}

impl Bar {
    /// A bar that only carries a closing price.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close: Some(close),
            volume: None,
        }
    }
}

/// One `(date, close)` observation of a normalized series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(with = "canonical_date")]
    pub date: NaiveDate,
    pub close: f64,
}

/// A closing-price series in canonical form: ascending by date with no
/// duplicate dates.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TimeSeries {
    points: Vec<PricePoint>,
}

impl TimeSeries {
    /// Builds a series from arbitrary points, sorting them by date.
    /// When a date occurs more than once the last occurrence wins.
    pub fn from_points(mut points: Vec<PricePoint>) -> Self {
        // A stable sort keeps input order among equal dates, so the
        // last duplicate is the one retained below.
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self { points: deduped }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    /// Dates rendered in the canonical `YYYY-MM-DD` format.
    pub fn dates_as_strings(&self) -> Vec<String> {
        self.points
            .iter()
            .map(|p| p.date.format(canonical_date::FORMAT).to_string())
            .collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }
}

/// Serializes dates as `YYYY-MM-DD`.
pub mod canonical_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}
