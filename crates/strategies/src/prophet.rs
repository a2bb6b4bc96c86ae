//! Additive trend plus seasonality forecasting.
//!
//! The model is `y(t) = trend(t) + seasonal(t)` where the trend is piecewise
//! linear with potential changepoints spread over the early history and each
//! seasonality is a truncated Fourier series. All terms are linear in their
//! coefficients, so fitting is a single ridge regression whose penalties
//! play the role of the priors on changepoint and seasonal magnitudes.

use crate::error::StrategyError;
use crate::linalg::ridge;
use crate::{Forecast, ForecastStrategy, check_horizon, finish};
use chrono::NaiveDate;
use configuration::ProphetParams;
use core_types::{StrategyKind, TimeSeries};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// Histories shorter than this many days get no yearly component.
const YEARLY_MIN_SPAN_DAYS: i64 = 730;
const WEEKLY_MIN_SPAN_DAYS: i64 = 14;
const TREND_PRIOR_SCALE: f64 = 5.0;
/// Lower bound on any ridge penalty.
const MIN_PENALTY: f64 = 1e-8;

#[derive(Debug, Clone, Copy)]
struct Seasonality {
    period_days: f64,
    order: usize,
}

const YEARLY: Seasonality = Seasonality { period_days: 365.25, order: 10 };
const WEEKLY: Seasonality = Seasonality { period_days: 7.0, order: 3 };
const DAILY: Seasonality = Seasonality { period_days: 1.0, order: 4 };

pub struct Prophet {
    params: ProphetParams,
}

/// Everything needed to build design rows for arbitrary dates.
struct Layout {
    start: NaiveDate,
    span_days: f64,
    changepoints: Vec<f64>,
    seasonalities: Vec<Seasonality>,
}

impl Layout {
    fn columns(&self) -> usize {
        2 + self.changepoints.len() + self.seasonalities.iter().map(|s| 2 * s.order).sum::<usize>()
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }

    fn row(&self, date: NaiveDate) -> Vec<f64> {
        let t = self.scaled_time(date);
        let mut row = Vec::with_capacity(self.columns());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|s| (t - s).max(0.0)));

        let epoch_days = (date - NaiveDate::default()).num_days() as f64;
        for season in &self.seasonalities {
            for k in 1..=season.order {
                let angle = 2.0 * PI * k as f64 * epoch_days / season.period_days;
                row.push(angle.sin());
                row.push(angle.cos());
            }
        }
        row
    }

    fn design(&self, dates: &[NaiveDate]) -> DMatrix<f64> {
        let cols = self.columns();
        let data: Vec<f64> = dates.iter().flat_map(|d| self.row(*d)).collect();
        DMatrix::from_row_slice(dates.len(), cols, &data)
    }
}

impl Prophet {
    pub fn new(params: ProphetParams) -> Result<Self, StrategyError> {
        if !(params.changepoint_range > 0.0 && params.changepoint_range <= 1.0) {
            return Err(StrategyError::InvalidInput(
                "changepoint_range must be in (0, 1]".to_string(),
            ));
        }
        Ok(Self { params })
    }

    fn layout(&self, dates: &[NaiveDate]) -> Result<Layout, StrategyError> {
        let (start, end) = match (dates.first(), dates.last()) {
            (Some(start), Some(end)) if end > start => (*start, *end),
            _ => {
                return Err(StrategyError::InvalidInput(
                    "additive model needs at least two distinct dates".to_string(),
                ));
            }
        };
        let span = (end - start).num_days();
        let span_days = span as f64;

        // Changepoints sit on observed dates, evenly spaced by index over
        // the first `changepoint_range` share of history.
        let history = ((dates.len() as f64) * self.params.changepoint_range).floor() as usize;
        let count = self.params.n_changepoints.min(history.saturating_sub(1));
        let changepoints = (1..=count)
            .map(|j| {
                let index = (j as f64 * (history - 1) as f64 / count as f64).round() as usize;
                (dates[index] - start).num_days() as f64 / span_days
            })
            .collect();

        let mut seasonalities = Vec::new();
        if self.params.yearly_seasonality && span >= YEARLY_MIN_SPAN_DAYS {
            seasonalities.push(YEARLY);
        }
        if self.params.weekly_seasonality && span >= WEEKLY_MIN_SPAN_DAYS {
            seasonalities.push(WEEKLY);
        }
        if self.params.daily_seasonality {
            seasonalities.push(DAILY);
        }

        Ok(Layout {
            start,
            span_days,
            changepoints,
            seasonalities,
        })
    }

    /// Penalties `noise / prior_scale^2` for each column of `layout`.
    fn penalties(&self, layout: &Layout, noise: f64) -> Vec<f64> {
        let penalty = |scale: f64| (noise / (scale * scale)).max(MIN_PENALTY);
        let seasonal_columns = layout.columns() - 2 - layout.changepoints.len();

        let mut penalties = vec![penalty(TREND_PRIOR_SCALE); 2];
        penalties.extend(std::iter::repeat_n(
            penalty(self.params.changepoint_prior_scale),
            layout.changepoints.len(),
        ));
        penalties.extend(std::iter::repeat_n(
            penalty(self.params.seasonality_prior_scale),
            seasonal_columns,
        ));
        penalties
    }
}

impl ForecastStrategy for Prophet {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AdditiveDecomposition
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<Forecast, StrategyError> {
        check_horizon(horizon)?;
        let dates = series.dates();
        let closes = series.closes();

        let y_scale = closes.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        if y_scale == 0.0 {
            return Err(StrategyError::InvalidInput("all closing prices are zero".to_string()));
        }
        let scaled: Vec<f64> = closes.iter().map(|v| v / y_scale).collect();

        let layout = self.layout(&dates)?;
        let penalties = self.penalties(&layout, noise_variance(&scaled));
        let design = layout.design(&dates);
        let target = DVector::from_vec(scaled);

        let coefficients = ridge(&design, &target, &penalties)
            .ok_or_else(|| StrategyError::Execution("additive model fit failed".to_string()))?;
        tracing::debug!(
            columns = layout.columns(),
            changepoints = layout.changepoints.len(),
            "Fitted additive model."
        );

        let last = dates
            .last()
            .copied()
            .ok_or_else(|| StrategyError::InvalidInput("empty series".to_string()))?;
        let future: Vec<NaiveDate> = (1..=horizon as u64).map(|d| last + chrono::Days::new(d)).collect();
        let predicted = layout.design(&future) * coefficients;

        finish(self.kind(), predicted.iter().map(|v| v * y_scale).collect(), horizon)
    }
}

/// Observation noise estimate from first differences: for a random walk
/// plus noise, half the variance of the differences.
fn noise_variance(values: &[f64]) -> f64 {
    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    if diffs.is_empty() {
        return MIN_PENALTY;
    }
    let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
    let variance = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / diffs.len() as f64;
    (variance / 2.0).max(MIN_PENALTY)
}
