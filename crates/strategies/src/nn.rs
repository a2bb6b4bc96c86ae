//! Helpers shared by the candle-based strategies.

use crate::error::StrategyError;
use candle_core::Tensor;
use candle_nn::VarMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

impl From<candle_core::Error> for StrategyError {
    fn from(e: candle_core::Error) -> Self {
        StrategyError::Execution(e.to_string())
    }
}

/// Re-initialises every trainable variable from a seeded generator.
///
/// Variables are visited in name order so the draw sequence does not depend
/// on hash-map iteration. Matrices get `U(-1/sqrt(fan_in), 1/sqrt(fan_in))`,
/// vectors and names ending in `pos` get zeros, and normalisation layers keep
/// their constant initialisation.
pub(crate) fn seed_parameters(varmap: &VarMap, seed: u64) -> Result<(), StrategyError> {
    let vars = varmap
        .data()
        .lock()
        .map_err(|_| StrategyError::Execution("parameter store lock poisoned".to_string()))?;
    let mut names: Vec<&String> = vars.keys().collect();
    names.sort();

    let mut rng = StdRng::seed_from_u64(seed);
    for name in names {
        if name.contains("norm") {
            continue;
        }
        let var = &vars[name];
        let dims = var.dims().to_vec();
        let count: usize = dims.iter().product();

        let values: Vec<f32> = match dims.last() {
            Some(fan_in) if dims.len() >= 2 && !name.ends_with("pos") => {
                let bound = 1.0 / (*fan_in as f32).sqrt();
                (0..count).map(|_| rng.gen_range(-bound..bound)).collect()
            }
            _ => vec![0.0; count],
        };
        var.set(&Tensor::from_vec(values, dims, var.device())?)?;
    }
    Ok(())
}

/// Lowers a slice of prices to the network's `f32` precision.
pub(crate) fn to_f32(values: &[f64]) -> Vec<f32> {
    values.iter().map(|v| *v as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{VarBuilder, linear};

    fn weights(seed: u64) -> Vec<f32> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let layer = linear(4, 3, vb.pp("dense")).unwrap();
        seed_parameters(&varmap, seed).unwrap();
        layer.weight().flatten_all().unwrap().to_vec1::<f32>().unwrap()
    }

    #[test]
    fn same_seed_gives_identical_weights() {
        assert_eq!(weights(42), weights(42));
        assert_ne!(weights(42), weights(7));
    }

    #[test]
    fn weights_respect_fan_in_bound() {
        assert!(weights(42).iter().all(|w| w.abs() <= 0.5));
    }
}
