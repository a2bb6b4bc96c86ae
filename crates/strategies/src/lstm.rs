//! Two-layer LSTM over sliding windows of min-max scaled closes.
//!
//! Training uses every complete window of `window` values paired with the
//! value that follows it. Forecasting feeds the latest window, appends the
//! prediction and drops the oldest value, `horizon` times, and only then
//! maps the predictions back to price scale.

use crate::error::StrategyError;
use crate::nn::{seed_parameters, to_f32};
use crate::scaling::MinMaxScaler;
use crate::{Forecast, ForecastStrategy, check_horizon, finish};
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    AdamW, LSTM, LSTMConfig, Linear, Module, Optimizer, ParamsAdamW, RNN, VarBuilder, VarMap,
    linear, lstm,
};
use configuration::LstmParams;
use core_types::{StrategyKind, TimeSeries};

pub struct Lstm {
    params: LstmParams,
}

struct Network {
    recurrent_1: LSTM,
    recurrent_2: LSTM,
    dense_1: Linear,
    dense_2: Linear,
}

impl Network {
    fn new(params: &LstmParams, vb: VarBuilder) -> candle_core::Result<Self> {
        let hidden = params.hidden_units;
        Ok(Self {
            recurrent_1: lstm(1, hidden, LSTMConfig::default(), vb.pp("lstm_1"))?,
            recurrent_2: lstm(hidden, hidden, LSTMConfig::default(), vb.pp("lstm_2"))?,
            dense_1: linear(hidden, params.dense_units, vb.pp("dense_1"))?,
            dense_2: linear(params.dense_units, 1, vb.pp("dense_2"))?,
        })
    }

    /// `(batch, window, 1)` to `(batch, 1)`.
    fn forward(&self, windows: &Tensor) -> candle_core::Result<Tensor> {
        let states = self.recurrent_1.seq(windows)?;
        let sequence = self.recurrent_1.states_to_tensor(&states)?;
        let states = self.recurrent_2.seq(&sequence)?;
        let last = match states.last() {
            Some(state) => state.h().clone(),
            None => candle_core::bail!("empty input window"),
        };
        self.dense_2.forward(&self.dense_1.forward(&last)?)
    }
}

impl Lstm {
    pub fn new(params: LstmParams) -> Result<Self, StrategyError> {
        if params.window == 0 || params.epochs == 0 || params.batch_size == 0 {
            return Err(StrategyError::InvalidInput(
                "LSTM window, epochs and batch size must be positive".to_string(),
            ));
        }
        Ok(Self { params })
    }

    fn train(&self, scaled: &[f64], device: &Device) -> Result<Network, StrategyError> {
        let window = self.params.window;
        let (inputs, targets) = training_windows(scaled, window);
        let count = targets.len();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let network = Network::new(&self.params, vb)?;
        if let Some(seed) = self.params.seed {
            seed_parameters(&varmap, seed)?;
        }

        let flat: Vec<f32> = inputs.iter().flat_map(|w| to_f32(w)).collect();
        let x = Tensor::from_vec(flat, (count, window, 1), device)?;
        let y = Tensor::from_vec(to_f32(&targets), (count, 1), device)?;

        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: self.params.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        for epoch in 0..self.params.epochs {
            let mut last_loss = 0.0;
            for start in (0..count).step_by(self.params.batch_size) {
                let len = self.params.batch_size.min(count - start);
                let prediction = network.forward(&x.narrow(0, start, len)?)?;
                let loss = candle_nn::loss::mse(&prediction, &y.narrow(0, start, len)?)?;
                optimizer.backward_step(&loss)?;
                last_loss = loss.to_scalar::<f32>()?;
            }
            tracing::debug!(epoch, windows = count, loss = last_loss, "LSTM epoch complete.");
        }
        Ok(network)
    }
}

impl ForecastStrategy for Lstm {
    fn kind(&self) -> StrategyKind {
        StrategyKind::SequenceNetwork
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<Forecast, StrategyError> {
        check_horizon(horizon)?;
        let closes = series.closes();
        let window = self.params.window;
        if closes.len() <= window {
            tracing::warn!(
                len = closes.len(),
                window,
                "Series too short to form a training window."
            );
            return Ok(Forecast::Empty);
        }

        let scaler = MinMaxScaler::fit(&closes)?;
        let scaled = scaler.transform(&closes);
        let device = Device::Cpu;
        let network = self.train(&scaled, &device)?;

        let mut current = scaled[scaled.len() - window..].to_vec();
        let mut predictions = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let input = Tensor::from_vec(to_f32(&current), (1, window, 1), &device)?;
            let output = network.forward(&input)?.flatten_all()?.to_vec1::<f32>()?;
            let next = output
                .first()
                .copied()
                .ok_or_else(|| StrategyError::Execution("network returned no output".to_string()))?
                as f64;
            predictions.push(next);
            current = advance_window(&current, next);
        }

        finish(self.kind(), scaler.inverse(&predictions), horizon)
    }
}

/// Every complete `(window values, next value)` pair, oldest first.
pub fn training_windows(values: &[f64], window: usize) -> (Vec<Vec<f64>>, Vec<f64>) {
    (window..values.len())
        .map(|i| (values[i - window..i].to_vec(), values[i]))
        .unzip()
}

/// Drops the oldest value and appends `next`, keeping the window length.
pub fn advance_window(window: &[f64], next: f64) -> Vec<f64> {
    window.iter().skip(1).copied().chain(std::iter::once(next)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assert_horizon, synthetic_series};

    fn strategy() -> Lstm {
        Lstm::new(LstmParams {
            seed: Some(7),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn sixty_one_values_form_exactly_one_window() {
        let values: Vec<f64> = (0..61).map(f64::from).collect();
        let (inputs, targets) = training_windows(&values, 60);
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].len(), 60);
        assert_eq!(targets, vec![60.0]);
    }

    #[test]
    fn window_advances_by_one() {
        assert_eq!(advance_window(&[1.0, 2.0, 3.0], 4.0), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn sixty_values_yield_empty_forecast() {
        assert_eq!(strategy().forecast(&synthetic_series(60), 3).unwrap(), Forecast::Empty);
    }

    #[test]
    fn sixty_one_values_forecast_the_full_horizon() {
        let forecast = strategy().forecast(&synthetic_series(61), 4).unwrap();
        assert_horizon(forecast.values().unwrap(), 4);
    }

    #[test]
    fn longer_series_trains_in_batches() {
        let forecast = strategy().forecast(&synthetic_series(160), 7).unwrap();
        assert_horizon(forecast.values().unwrap(), 7);
    }
}
