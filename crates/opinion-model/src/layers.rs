//! Building blocks assembled from candle primitives.
//!
//! Layer norm is composed from elementwise ops rather than the fused kernel so
//! gradients flow through it on every backend.

use candle_core::{Tensor, D};
use candle_nn::{Embedding, Linear, Module};
use rand::rngs::SmallRng;
use rand::Rng;

use crate::error::ModelResult;
use crate::params::ParamStore;

/// Dense layer with weights and bias drawn from U(-1/√fan_in, 1/√fan_in).
pub fn linear(store: &mut ParamStore, name: &str, in_dim: usize, out_dim: usize) -> ModelResult<Linear> {
    let bound = 1.0 / (in_dim as f64).sqrt();
    let weight = store.uniform(&format!("{name}.weight"), &[out_dim, in_dim], bound)?;
    let bias = store.uniform(&format!("{name}.bias"), &[out_dim], bound)?;
    Ok(Linear::new(weight, Some(bias)))
}

/// Lookup table with rows drawn from N(0, 1).
pub fn embedding(store: &mut ParamStore, name: &str, vocab_size: usize, dim: usize) -> ModelResult<Embedding> {
    let table = store.normal(&format!("{name}.weight"), &[vocab_size, dim], 1.0)?;
    Ok(Embedding::new(table, dim))
}

/// Normalizes the last dimension to zero mean and unit variance, then
/// applies a learned scale and shift.
#[derive(Debug, Clone)]
pub struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub const DEFAULT_EPS: f64 = 1e-5;

    pub fn new(store: &mut ParamStore, name: &str, dim: usize) -> ModelResult<Self> {
        Ok(Self {
            weight: store.constant(&format!("{name}.weight"), &[dim], 1.0)?,
            bias: store.constant(&format!("{name}.bias"), &[dim], 0.0)?,
            eps: Self::DEFAULT_EPS,
        })
    }
}

impl Module for LayerNorm {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let normed = centered.broadcast_div(&(var + self.eps)?.sqrt()?)?;
        normed.broadcast_mul(&self.weight)?.broadcast_add(&self.bias)
    }
}

/// Inverted dropout driven by a caller-supplied RNG.
///
/// With no RNG (inference) the input passes through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Dropout {
    p: f32,
}

impl Dropout {
    pub fn new(p: f32) -> Self {
        Self { p }
    }

    pub fn forward(&self, xs: &Tensor, rng: Option<&mut SmallRng>) -> ModelResult<Tensor> {
        let rng = match rng {
            Some(rng) if self.p > 0.0 => rng,
            _ => return Ok(xs.clone()),
        };
        let keep = 1.0 - self.p;
        let scale = 1.0 / keep;
        let mask: Vec<f32> = (0..xs.elem_count())
            .map(|_| if rng.gen::<f32>() < keep { scale } else { 0.0 })
            .collect();
        let mask = Tensor::from_vec(mask, xs.dims(), xs.device())?;
        Ok(xs.mul(&mask)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use candle_core::Device;
    use rand::SeedableRng;

    #[test]
    fn test_layer_norm_normalizes_rows() {
        let mut store = ParamStore::new(0, &Device::Cpu);
        let norm = LayerNorm::new(&mut store, "ln", 4).unwrap();

        let xs = Tensor::new(&[[1.0f32, 2.0, 3.0, 4.0], [10.0, 10.0, 10.0, 14.0]], &Device::Cpu).unwrap();
        let out = norm.forward(&xs).unwrap().to_vec2::<f32>().unwrap();

        for row in out {
            let mean: f32 = row.iter().sum::<f32>() / 4.0;
            let var: f32 = row.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-5);
            assert_relative_eq!(var, 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_linear_shapes() {
        let mut store = ParamStore::new(0, &Device::Cpu);
        let layer = linear(&mut store, "proj", 3, 5).unwrap();

        let xs = Tensor::zeros((2, 3), candle_core::DType::F32, &Device::Cpu).unwrap();
        assert_eq!(layer.forward(&xs).unwrap().dims(), &[2, 5]);
        assert_eq!(store.num_params(), 3 * 5 + 5);
    }

    #[test]
    fn test_dropout_is_identity_without_rng() {
        let xs = Tensor::ones((3, 4), candle_core::DType::F32, &Device::Cpu).unwrap();
        let out = Dropout::new(0.5).forward(&xs, None).unwrap();
        assert_eq!(out.to_vec2::<f32>().unwrap(), xs.to_vec2::<f32>().unwrap());
    }

    #[test]
    fn test_dropout_zeroes_or_rescales() {
        let xs = Tensor::ones((8, 8), candle_core::DType::F32, &Device::Cpu).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let out = Dropout::new(0.5).forward(&xs, Some(&mut rng)).unwrap();

        let values = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(values.iter().all(|v| *v == 0.0 || *v == 2.0));
        assert!(values.iter().any(|v| *v == 0.0));
        assert!(values.iter().any(|v| *v == 2.0));
    }
}
