//! Causal self-attention network over max-normalised closes.
//!
//! Each observation is projected to `d_model` features, a learnable
//! positional table is added and a stack of post-norm encoder blocks with a
//! future mask is applied, so position `i` only sees positions `<= i`. The
//! network is trained with a one-step-ahead loss on the whole history and
//! forecasts by re-running the growing sequence and taking the last output.
//! Every parameter is initialised from a fixed seed, so identical input
//! gives identical output.

use crate::error::StrategyError;
use crate::nn::{seed_parameters, to_f32};
use crate::scaling::MaxScaler;
use crate::{Forecast, ForecastStrategy, check_horizon, finish};
use candle_core::{D, DType, Device, Tensor};
use candle_nn::{
    AdamW, Init, LayerNorm, Linear, Module, Optimizer, ParamsAdamW, VarBuilder, VarMap, layer_norm,
    linear,
};
use configuration::TftParams;
use core_types::{StrategyKind, TimeSeries};

const LAYER_NORM_EPS: f64 = 1e-5;

pub struct Tft {
    params: TftParams,
}

struct EncoderBlock {
    heads: usize,
    query: Linear,
    key: Linear,
    value: Linear,
    output: Linear,
    attention_norm: LayerNorm,
    feed_forward_in: Linear,
    feed_forward_out: Linear,
    feed_forward_norm: LayerNorm,
}

impl EncoderBlock {
    fn new(params: &TftParams, vb: VarBuilder) -> candle_core::Result<Self> {
        let d = params.d_model;
        Ok(Self {
            heads: params.heads,
            query: linear(d, d, vb.pp("query"))?,
            key: linear(d, d, vb.pp("key"))?,
            value: linear(d, d, vb.pp("value"))?,
            output: linear(d, d, vb.pp("output"))?,
            attention_norm: layer_norm(d, LAYER_NORM_EPS, vb.pp("attention_norm"))?,
            feed_forward_in: linear(d, params.feed_forward, vb.pp("feed_forward_in"))?,
            feed_forward_out: linear(params.feed_forward, d, vb.pp("feed_forward_out"))?,
            feed_forward_norm: layer_norm(d, LAYER_NORM_EPS, vb.pp("feed_forward_norm"))?,
        })
    }

    /// `(batch, len, d_model)` in and out; `mask` is `(len, len)`.
    fn forward(&self, x: &Tensor, mask: &Tensor) -> candle_core::Result<Tensor> {
        let (batch, len, d_model) = x.dims3()?;
        let head_dim = d_model / self.heads;
        let split = |t: Tensor| -> candle_core::Result<Tensor> {
            t.reshape((batch, len, self.heads, head_dim))?.transpose(1, 2)?.contiguous()
        };

        let q = split(self.query.forward(x)?)?;
        let k = split(self.key.forward(x)?)?;
        let v = split(self.value.forward(x)?)?;

        let scores = (q.matmul(&k.t()?.contiguous()?)? / (head_dim as f64).sqrt())?;
        let weights = candle_nn::ops::softmax(&scores.broadcast_add(mask)?, D::Minus1)?;
        let attended = weights
            .matmul(&v)?
            .transpose(1, 2)?
            .reshape((batch, len, d_model))?;

        let x = self.attention_norm.forward(&x.add(&self.output.forward(&attended)?)?)?;
        let hidden = self.feed_forward_in.forward(&x)?.relu()?;
        let x = x.add(&self.feed_forward_out.forward(&hidden)?)?;
        self.feed_forward_norm.forward(&x)
    }
}

struct Network {
    embed: Linear,
    positions: Tensor,
    blocks: Vec<EncoderBlock>,
    decoder: Linear,
}

impl Network {
    fn new(params: &TftParams, max_len: usize, vb: VarBuilder) -> candle_core::Result<Self> {
        let blocks = (0..params.layers)
            .map(|i| EncoderBlock::new(params, vb.pp(format!("block_{}", i))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self {
            embed: linear(1, params.d_model, vb.pp("embed"))?,
            positions: vb.get_with_hints((max_len, params.d_model), "pos", Init::Const(0.0))?,
            blocks,
            decoder: linear(params.d_model, 1, vb.pp("decoder"))?,
        })
    }

    /// `(1, len, 1)` to `(1, len, 1)`, output `i` predicting value `i + 1`.
    fn forward(&self, values: &Tensor) -> candle_core::Result<Tensor> {
        let len = values.dim(1)?;
        let positions = self.positions.narrow(0, 0, len)?.unsqueeze(0)?;
        let mut hidden = self.embed.forward(values)?.broadcast_add(&positions)?;
        let mask = causal_mask(len, values.device())?;
        for block in &self.blocks {
            hidden = block.forward(&hidden, &mask)?;
        }
        self.decoder.forward(&hidden)
    }
}

/// `(len, len)` additive mask: `0` on and below the diagonal, `-inf` above.
fn causal_mask(len: usize, device: &Device) -> candle_core::Result<Tensor> {
    let mask: Vec<f32> = (0..len)
        .flat_map(|i| (0..len).map(move |j| if j > i { f32::NEG_INFINITY } else { 0.0 }))
        .collect();
    Tensor::from_vec(mask, (len, len), device)
}

fn sequence_tensor(values: &[f64], device: &Device) -> candle_core::Result<Tensor> {
    Tensor::from_vec(to_f32(values), (1, values.len(), 1), device)
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl Tft {
    pub fn new(params: TftParams) -> Result<Self, StrategyError> {
        if params.heads == 0 || params.d_model % params.heads != 0 {
            return Err(StrategyError::InvalidInput(format!(
                "d_model {} is not divisible into {} heads",
                params.d_model, params.heads
            )));
        }
        if params.layers == 0 || params.epochs == 0 {
            return Err(StrategyError::InvalidInput(
                "attention network needs at least one layer and one epoch".to_string(),
            ));
        }
        Ok(Self { params })
    }

    fn train(&self, normalised: &[f64], max_len: usize, device: &Device) -> Result<Network, StrategyError> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let network = Network::new(&self.params, max_len, vb)?;
        seed_parameters(&varmap, self.params.seed)?;

        let n = normalised.len();
        let inputs = sequence_tensor(&normalised[..n - 1], device)?;
        let targets = sequence_tensor(&normalised[1..], device)?;

        let mut optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: self.params.learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;
        for epoch in 0..self.params.epochs {
            let loss = candle_nn::loss::mse(&network.forward(&inputs)?, &targets)?;
            optimizer.backward_step(&loss)?;
            let loss = loss.to_scalar::<f32>()?;
            tracing::trace!(epoch, loss, "Attention network epoch complete.");
        }
        Ok(network)
    }
}

impl ForecastStrategy for Tft {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AttentionNetwork
    }

    fn forecast(&self, series: &TimeSeries, horizon: usize) -> Result<Forecast, StrategyError> {
        check_horizon(horizon)?;
        let closes = series.closes();
        if closes.len() < 2 {
            return Err(StrategyError::InvalidInput(
                "attention network needs at least two observations".to_string(),
            ));
        }

        let scaler = MaxScaler::fit(&closes)?;
        let mut sequence = scaler.transform(&closes);
        let device = Device::Cpu;
        // The longest sequence fed forward is history plus horizon - 1.
        let network = self.train(&sequence, closes.len() + horizon, &device)?;

        let mut predictions = Vec::with_capacity(horizon);
        for _ in 0..horizon {
            let output = network
                .forward(&sequence_tensor(&sequence, &device)?)?
                .flatten_all()?
                .to_vec1::<f32>()?;
            let next = output
                .last()
                .copied()
                .ok_or_else(|| StrategyError::Execution("network returned no output".to_string()))?
                as f64;
            predictions.push(round_cents(scaler.inverse(next)));
            sequence.push(next);
        }

        finish(self.kind(), predictions, horizon)
    }
}
