//! # Foresight Strategy Library
//!
//! This crate contains the forecasting logic for the Foresight service. It
//! defines a universal `ForecastStrategy` trait and provides five concrete
//! implementations, each behind its own cargo feature.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** Strategies have no knowledge of HTTP or market-data
//!   sources. They depend only on `core-types` and `configuration`.
//! - **Stateless Invocations:** Every call fits a transient model on the
//!   series it is given and discards it afterwards.
//! - **Explicit Outcomes:** A strategy either fails (`Err`), runs but has
//!   nothing to say (`Forecast::Empty`), or returns exactly `horizon` values.
//!
//! ## Public API
//!
//! - `ForecastStrategy`: The core trait all strategies implement.
//! - `Forecast`: The successful outcome of a strategy invocation.
//! - `StrategyRegistry`: The immutable mapping from `StrategyKind` to an
//!   implementation or an unavailability reason.

// Declare all the modules that constitute this crate.
pub mod error;
pub mod registry;

#[cfg(feature = "arima")]
pub mod arima;
#[cfg(feature = "gradient-boosting")]
pub mod gradient_boosting;
#[cfg(any(feature = "arima", feature = "prophet"))]
mod linalg;
#[cfg(feature = "lstm")]
pub mod lstm;
#[cfg(feature = "neural")]
mod nn;
#[cfg(feature = "prophet")]
pub mod prophet;
#[cfg(feature = "neural")]
pub mod scaling;
#[cfg(feature = "tft")]
pub mod tft;

// Re-export the key components to create a clean, public-facing API.
pub use error::StrategyError;
pub use registry::{StrategyRegistry, StrategyStatus};

#[cfg(feature = "arima")]
pub use arima::Arima;
#[cfg(feature = "gradient-boosting")]
pub use gradient_boosting::GradientBoosting;
#[cfg(feature = "lstm")]
pub use lstm::Lstm;
#[cfg(feature = "prophet")]
pub use prophet::Prophet;
#[cfg(feature = "tft")]
pub use tft::Tft;

pub use core_types::StrategyKind;

use core_types::{MAX_HORIZON, TimeSeries};

/// The successful outcome of running a strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum Forecast {
    /// Exactly `horizon` finite predictions, index `i` being step `i + 1`.
    Values(Vec<f64>),
    /// The strategy ran but could not produce a prediction for this data.
    Empty,
}

impl Forecast {
    pub fn values(&self) -> Option<&[f64]> {
        match self {
            Forecast::Values(values) => Some(values),
            Forecast::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Forecast::Empty)
    }
}

/// The core trait that all forecasting strategies must implement.
///
/// Implementations are stateless between calls, so `&self` suffices and a
/// single instance can serve concurrent requests. The `Send + Sync` bounds
/// allow the registry to hand strategies to worker threads.
pub trait ForecastStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Forecasts `horizon` steps past the last observation of `series`.
    ///
    /// # Returns
    ///
    /// * `Ok(Forecast::Values(_))` - exactly `horizon` finite values.
    /// * `Ok(Forecast::Empty)` - the data does not support a prediction.
    /// * `Err(StrategyError)` - the input was invalid or fitting failed.
    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<Forecast, StrategyError>;
}

/// Rejects a horizon outside `1..=MAX_HORIZON` before any model is fitted
/// or any buffer is sized from it.
pub(crate) fn check_horizon(horizon: usize) -> Result<(), StrategyError> {
    if horizon == 0 {
        return Err(StrategyError::InvalidInput(
            "forecast horizon must be at least one step".to_string(),
        ));
    }
    if horizon > MAX_HORIZON {
        return Err(StrategyError::InvalidInput(format!(
            "forecast horizon {} exceeds the maximum of {} steps",
            horizon, MAX_HORIZON
        )));
    }
    Ok(())
}

/// Wraps raw predictions, enforcing the length and finiteness guarantees.
pub(crate) fn finish(kind: StrategyKind, values: Vec<f64>, horizon: usize) -> Result<Forecast, StrategyError> {
    if values.len() != horizon {
        return Err(StrategyError::Execution(format!(
            "{} produced {} values for a horizon of {}",
            kind,
            values.len(),
            horizon
        )));
    }
    if let Some(position) = values.iter().position(|v| !v.is_finite()) {
        return Err(StrategyError::Execution(format!(
            "{} produced a non-finite value at step {}",
            kind,
            position + 1
        )));
    }
    Ok(Forecast::Values(values))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_rejects_wrong_length_and_non_finite_values() {
        let kind = StrategyKind::AdditiveDecomposition;
        assert!(matches!(finish(kind, vec![1.0], 2), Err(StrategyError::Execution(_))));
        assert!(matches!(
            finish(kind, vec![1.0, f64::NAN], 2),
            Err(StrategyError::Execution(_))
        ));
        assert_eq!(finish(kind, vec![1.0, 2.0], 2).unwrap(), Forecast::Values(vec![1.0, 2.0]));
    }

    #[test]
    fn zero_horizon_is_invalid_input() {
        assert!(matches!(check_horizon(0), Err(StrategyError::InvalidInput(_))));
        assert!(check_horizon(1).is_ok());
    }

    #[test]
    fn horizon_above_the_ceiling_is_invalid_input() {
        assert!(check_horizon(MAX_HORIZON).is_ok());
        assert!(matches!(check_horizon(MAX_HORIZON + 1), Err(StrategyError::InvalidInput(_))));
        assert!(matches!(check_horizon(usize::MAX), Err(StrategyError::InvalidInput(_))));
    }
}
