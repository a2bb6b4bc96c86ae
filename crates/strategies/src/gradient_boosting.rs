//! Gradient-boosted regression trees on lagged closes.
//!
//! Each row of the training set holds the previous `lags` closes (most
//! recent first) and targets the current close. Boosting minimises squared
//! error: every round fits a depth-limited tree to the current residuals
//! and adds a shrunk copy of its predictions to the ensemble.

use crate::error::StrategyError;
use crate::{Forecast, ForecastStrategy, check_horizon, finish};
use configuration::GradientBoostingParams;
use core_types::{StrategyKind, TimeSeries};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_regressor::{DecisionTreeRegressor, DecisionTreeRegressorParameters};

type Tree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

pub struct GradientBoosting {
    params: GradientBoostingParams,
}

/// A fitted ensemble: `base + learning_rate * sum(tree(x))`.
struct Ensemble {
    base: f64,
    learning_rate: f64,
    trees: Vec<Tree>,
}

impl Ensemble {
    fn predict(&self, features: &[f64]) -> Result<f64, String> {
        let row = DenseMatrix::from_2d_vec(&vec![features.to_vec()]).map_err(|e| format!("Matrix error: {}", e))?;
        let mut prediction = self.base;
        for tree in &self.trees {
            let output = tree.predict(&row).map_err(|e| format!("Tree prediction failed: {}", e))?;
            prediction += self.learning_rate * output.first().copied().unwrap_or_default();
        }
        Ok(prediction)
    }
}

impl GradientBoosting {
    pub fn new(params: GradientBoostingParams) -> Result<Self, StrategyError> {
        if params.lags == 0 || params.n_estimators == 0 || params.max_depth == 0 {
            return Err(StrategyError::InvalidInput(
                "gradient boosting needs positive lags, estimators and depth".to_string(),
            ));
        }
        Ok(Self { params })
    }

    fn fit(&self, features: &[Vec<f64>], targets: &[f64]) -> Result<Ensemble, String> {
        let x = DenseMatrix::from_2d_vec(&features.to_vec()).map_err(|e| format!("Matrix error: {}", e))?;
        let base = targets.iter().sum::<f64>() / targets.len() as f64;
        let mut fitted = vec![base; targets.len()];
        let mut trees = Vec::with_capacity(self.params.n_estimators);

        for _ in 0..self.params.n_estimators {
            let residuals: Vec<f64> = targets.iter().zip(&fitted).map(|(y, f)| y - f).collect();
            let tree_params = DecisionTreeRegressorParameters::default().with_max_depth(self.params.max_depth);
            let tree = Tree::fit(&x, &residuals, tree_params).map_err(|e| format!("Tree fit failed: {}", e))?;
            let step = tree.predict(&x).map_err(|e| format!("Tree prediction failed: {}", e))?;
            for (f, s) in fitted.iter_mut().zip(step) {
                *f += self.params.learning_rate * s;
            }
            trees.push(tree);
        }

        Ok(Ensemble {
            base,
            learning_rate: self.params.learning_rate,
            trees,
        })
    }

    fn try_forecast(&self, closes: &[f64], horizon: usize) -> Result<Option<Vec<f64>>, String> {
        let (features, targets) = lag_features(closes, self.params.lags);
        if targets.len() < self.params.min_rows.max(1) {
            tracing::warn!(
                rows = targets.len(),
                required = self.params.min_rows,
                "Too few rows after building lag features."
            );
            return Ok(None);
        }

        let ensemble = self.fit(&features, &targets)?;

        // Seed the loop with the most recent observed closes, newest first.
        let mut window: Vec<f64> = closes.iter().rev().take(self.params.lags).copied().collect();
        let mut forecast = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let prediction = ensemble.predict(&window)?;
            forecast.push(prediction);
            window = slide_window(&window, prediction);
        }
        Ok(Some(forecast))
    }
}

impl ForecastStrategy for GradientBoosting {
    fn kind(&self) -> StrategyKind {
        StrategyKind::GradientBoostedTrees
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<Forecast, StrategyError> {
        check_horizon(horizon)?;
        match self.try_forecast(&series.closes(), horizon) {
            Ok(Some(values)) => finish(self.kind(), values, horizon),
            Ok(None) => Ok(Forecast::Empty),
            Err(reason) => {
                tracing::warn!(%reason, "Gradient boosting failed; returning no forecast.");
                Ok(Forecast::Empty)
            }
        }
    }
}

/// Builds `(features, target)` rows. Row `t` holds `[c[t-1], .., c[t-lags]]`
/// and targets `c[t]`; the first `lags` closes have incomplete lags and are
/// dropped.
pub fn lag_features(closes: &[f64], lags: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    (lags..closes.len())
        .map(|t| ((1..=lags).map(|k| closes[t - k]).collect(), closes[t]))
        .unzip()
}

/// Advances a lag window by one step: the prediction becomes lag 1 and the
/// oldest lag falls off, so `[L1, L2, L3]` with `P` becomes `[P, L1, L2]`.
pub fn slide_window(window: &[f64], prediction: f64) -> Vec<f64> {
    std::iter::once(prediction)
        .chain(window.iter().take(window.len().saturating_sub(1)).copied())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_horizon, synthetic_series};
    use rstest::rstest;

    fn small_params() -> GradientBoostingParams {
        GradientBoostingParams {
            n_estimators: 20,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(&[3.0, 2.0, 1.0], 9.0, &[9.0, 3.0, 2.0])]
    #[case(&[9.0, 3.0, 2.0], 8.0, &[8.0, 9.0, 3.0])]
    #[case(&[5.0], 6.0, &[6.0])]
    fn window_slides_newest_prediction_to_front(
        #[case] window: &[f64],
        #[case] prediction: f64,
        #[case] expected: &[f64],
    ) {
        assert_eq!(slide_window(window, prediction), expected);
    }

    #[test]
    fn lag_rows_drop_incomplete_prefix() {
        let (features, targets) = lag_features(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(features, vec![vec![3.0, 2.0, 1.0], vec![4.0, 3.0, 2.0]]);
        assert_eq!(targets, vec![4.0, 5.0]);
    }

    #[test]
    fn forecasts_exactly_the_requested_horizon() {
        let strategy = GradientBoosting::new(GradientBoostingParams::default()).unwrap();
        let forecast = strategy.forecast(&synthetic_series(300), 5).unwrap();
        assert_horizon(forecast.values().unwrap(), 5);
    }

    #[test]
    fn forecast_stays_within_the_training_range() {
        // Tree leaves average training targets, so predictions cannot
        // leave the span of observed closes by more than boosting overshoot.
        let series = synthetic_series(200);
        let closes = series.closes();
        let lo = closes.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let strategy = GradientBoosting::new(small_params()).unwrap();
        let values = strategy.forecast(&series, 10).unwrap().values().unwrap().to_vec();
        let slack = 0.1 * (hi - lo);
        assert!(values.iter().all(|v| *v >= lo - slack && *v <= hi + slack), "{:?}", values);
    }

    #[test]
    fn too_few_lag_rows_yield_empty() {
        let strategy = GradientBoosting::new(small_params()).unwrap();
        // 12 closes leave 9 complete rows.
        assert_eq!(strategy.forecast(&synthetic_series(12), 3).unwrap(), Forecast::Empty);
        assert!(!strategy.forecast(&synthetic_series(13), 3).unwrap().is_empty());
    }
}
