//! Fixed-order ARIMA(p, d, 0) forecasting.
//!
//! The model is fitted by conditional least squares on the differenced
//! series without an intercept, forecast recursively and integrated back to
//! price levels. Fitting problems are not errors for this strategy: they
//! yield [`Forecast::Empty`] and a warning.

use crate::error::StrategyError;
use crate::linalg::least_squares;
use crate::{Forecast, ForecastStrategy, check_horizon};
use configuration::ArimaParams;
use core_types::{StrategyKind, TimeSeries};
use nalgebra::{DMatrix, DVector};

pub struct Arima {
    params: ArimaParams,
}

impl Arima {
    pub fn new(params: ArimaParams) -> Result<Self, StrategyError> {
        if params.ar_order == 0 {
            return Err(StrategyError::InvalidInput("ARIMA needs an AR order of at least 1".to_string()));
        }
        Ok(Self { params })
    }

    /// Fits AR coefficients on an already differenced series.
    fn fit_ar(&self, diffed: &[f64]) -> Result<Vec<f64>, String> {
        let p = self.params.ar_order;
        let rows = diffed.len().saturating_sub(p);
        if rows <= p {
            return Err(format!("{} differenced observations are too few for AR({})", diffed.len(), p));
        }

        // Row r regresses diffed[r + p] on its p predecessors, most recent first.
        let design = DMatrix::from_fn(rows, p, |r, c| diffed[r + p - 1 - c]);
        let target = DVector::from_iterator(rows, diffed[p..].iter().copied());

        least_squares(design, &target)
            .map(|coefficients| coefficients.iter().copied().collect())
            .ok_or_else(|| "least-squares solve failed".to_string())
    }

    fn try_forecast(&self, closes: &[f64], horizon: usize) -> Result<Vec<f64>, String> {
        // levels[k] is the series differenced k times.
        let mut levels = vec![closes.to_vec()];
        for _ in 0..self.params.differencing {
            let next = difference(levels.last().map(Vec::as_slice).unwrap_or_default());
            levels.push(next);
        }
        let diffed = levels.last().map(Vec::as_slice).unwrap_or_default();

        let coefficients = self.fit_ar(diffed)?;
        tracing::debug!(?coefficients, "Fitted AR coefficients.");

        let mut forecast = ar_recursion(diffed, &coefficients, horizon);
        for level in levels.iter().rev().skip(1) {
            let anchor = *level.last().ok_or("empty series level")?;
            forecast = integrate(anchor, &forecast);
        }

        if forecast.iter().any(|v| !v.is_finite()) {
            return Err("forecast diverged to non-finite values".to_string());
        }
        Ok(forecast)
    }
}

impl ForecastStrategy for Arima {
    fn kind(&self) -> StrategyKind {
        StrategyKind::StatisticalAr
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<Forecast, StrategyError> {
        check_horizon(horizon)?;
        match self.try_forecast(&series.closes(), horizon) {
            Ok(values) => Ok(Forecast::Values(values)),
            Err(reason) => {
                tracing::warn!(%reason, "ARIMA fit failed; returning no forecast.");
                Ok(Forecast::Empty)
            }
        }
    }
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Cumulative sum of `steps` starting from `anchor`.
fn integrate(anchor: f64, steps: &[f64]) -> Vec<f64> {
    steps
        .iter()
        .scan(anchor, |level, step| {
            *level += step;
            Some(*level)
        })
        .collect()
}

/// Multi-step AR forecast, feeding each prediction back as the newest lag.
fn ar_recursion(history: &[f64], coefficients: &[f64], horizon: usize) -> Vec<f64> {
    let p = coefficients.len();
    let mut recent = history[history.len().saturating_sub(p)..].to_vec();
    let mut forecasts = Vec::with_capacity(horizon);

    for _ in 0..horizon {
        let next: f64 = coefficients
            .iter()
            .zip(recent.iter().rev())
            .map(|(phi, value)| phi * value)
            .sum();
        recent.push(next);
        forecasts.push(next);
    }
    forecasts
}
