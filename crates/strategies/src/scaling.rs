//! Reversible value scalers used by the neural strategies.

use crate::error::StrategyError;

/// Maps values linearly onto `[0, 1]` using the fitted minimum and maximum.
///
/// A constant input has no range; it is mapped to `0` and inverted back to
/// the constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    range: f64,
}

impl MinMaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self, StrategyError> {
        if values.is_empty() {
            return Err(StrategyError::InvalidInput("cannot fit a scaler on no values".to_string()));
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mut range = max - min;
        // Avoid division by zero
        if range < 1e-12 {
            range = 1.0;
        }
        Ok(Self { min, range })
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| (v - self.min) / self.range).collect()
    }

    pub fn inverse(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v * self.range + self.min).collect()
    }
}

/// Divides by the maximum of the fitted values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxScaler {
    max: f64,
}

impl MaxScaler {
    pub fn fit(values: &[f64]) -> Result<Self, StrategyError> {
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() || max <= 0.0 {
            return Err(StrategyError::InvalidInput(format!(
                "max-normalisation needs a positive maximum, got {}",
                max
            )));
        }
        Ok(Self { max })
    }

    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values.iter().map(|v| v / self.max).collect()
    }

    pub fn inverse(&self, value: f64) -> f64 {
        value * self.max
    }
}
