//! Opinion Model
//!
//! Maps `(token sequence, current opinion)` to a predicted opinion:
//!
//! ```text
//! tokens ─▶ embedding ─▶ encoder ─▶ masked mean pool ─┐
//!                                                     + ─▶ head ─▶ tanh
//! opinion ─────────────────────────▶ opinion_proj ────┘
//! ```
//!
//! Every call is a pure function of the current parameters and inputs.

use candle_core::{DType, Device, Tensor};
use candle_nn::{Embedding, Linear, Module};
use rand::rngs::SmallRng;

use crate::config::ModelConfig;
use crate::encoder::{SequenceEncoder, TransformerEncoder};
use crate::error::{ModelError, ModelResult};
use crate::layers::{embedding, linear};
use crate::params::ParamStore;
use crate::vocab::PAD_ID;

/// Picks CUDA device 0 when `prefer_gpu` is set and one is usable, CPU
/// otherwise. Without the `cuda` feature this is always the CPU.
pub fn select_device(prefer_gpu: bool) -> ModelResult<Device> {
    if prefer_gpu {
        Ok(Device::cuda_if_available(0)?)
    } else {
        Ok(Device::Cpu)
    }
}

/// `[batch, seq_len]` u8 mask, 1 where the token is padding.
pub fn padding_mask(tokens: &Tensor) -> ModelResult<Tensor> {
    let pad = Tensor::new(&[PAD_ID], tokens.device())?;
    Ok(tokens.broadcast_eq(&pad)?)
}

/// Mean over non-padding positions.
///
/// Padding positions are replaced by zero before summing, so whatever the
/// encoder left there cannot leak into the result. Rows made entirely of
/// padding divide by 1 and pool to zero.
pub fn masked_mean_pool(encoded: &Tensor, padding_mask: &Tensor) -> ModelResult<Tensor> {
    let (batch, seq_len, _) = encoded.dims3()?;
    if padding_mask.dims2()? != (batch, seq_len) {
        return Err(ModelError::ShapeMismatch {
            what: "padding mask",
            expected: format!("[{batch}, {seq_len}]"),
            found: format!("{:?}", padding_mask.dims()),
        });
    }

    let pad = padding_mask.unsqueeze(2)?.broadcast_as(encoded.shape())?;
    let zeros = encoded.zeros_like()?;
    let kept = pad.where_cond(&zeros, encoded)?;
    let summed = kept.sum(1)?;

    // [batch, 1] count of real tokens, at least 1
    let lengths = padding_mask
        .to_dtype(DType::F32)?
        .affine(-1.0, 1.0)?
        .sum_keepdim(1)?
        .maximum(1.0)?;
    Ok(summed.broadcast_div(&lengths)?)
}

/// Neural opinion-update model with a pluggable sequence encoder.
#[derive(Debug)]
pub struct OpinionModel<E = TransformerEncoder> {
    config: ModelConfig,
    vocab_size: usize,
    embedding: Embedding,
    encoder: E,
    opinion_proj: Linear,
    head: Linear,
    params: ParamStore,
}

impl OpinionModel<TransformerEncoder> {
    /// Builds a model with freshly initialized weights drawn from `seed`.
    pub fn new(config: &ModelConfig, vocab_size: usize, seed: u64, device: &Device) -> ModelResult<Self> {
        config.validate()?;
        let mut params = ParamStore::new(seed, device);
        let encoder = TransformerEncoder::new(&mut params, "encoder", config)?;
        Self::from_parts(config, vocab_size, params, encoder)
    }
}

impl<E: SequenceEncoder> OpinionModel<E> {
    /// Assembles a model around an already-built encoder, registering the
    /// embedding, opinion projection and head in the same parameter store.
    pub fn from_parts(
        config: &ModelConfig,
        vocab_size: usize,
        mut params: ParamStore,
        encoder: E,
    ) -> ModelResult<Self> {
        config.validate()?;
        if vocab_size == 0 {
            return Err(ModelError::InvalidConfig("vocabulary is empty".into()));
        }
        let embedding = embedding(&mut params, "emb", vocab_size, config.d_model)?;
        let opinion_proj = linear(&mut params, "op_proj", config.opinion_dim, config.d_model)?;
        let head = linear(&mut params, "head", config.d_model, config.opinion_dim)?;

        tracing::debug!(
            vocab_size,
            tensors = params.len(),
            params = params.num_params(),
            "Built opinion model"
        );

        Ok(Self {
            config: config.clone(),
            vocab_size,
            embedding,
            encoder,
            opinion_proj,
            head,
            params,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn opinion_dim(&self) -> usize {
        self.config.opinion_dim
    }

    pub fn device(&self) -> &Device {
        self.params.device()
    }

    pub fn params(&self) -> &ParamStore {
        &self.params
    }

    /// Inference pass: `tokens` `[batch, seq_len]` u32, `opinion`
    /// `[batch, opinion_dim]` f32 → `[batch, opinion_dim]` in (-1, 1).
    pub fn forward(&self, tokens: &Tensor, opinion: &Tensor) -> ModelResult<Tensor> {
        self.run(tokens, opinion, None)
    }

    /// Training pass with dropout masks drawn from `rng`.
    pub fn forward_train(&self, tokens: &Tensor, opinion: &Tensor, rng: &mut SmallRng) -> ModelResult<Tensor> {
        self.run(tokens, opinion, Some(rng))
    }

    fn run(&self, tokens: &Tensor, opinion: &Tensor, rng: Option<&mut SmallRng>) -> ModelResult<Tensor> {
        self.check_inputs(tokens, opinion)?;

        let mask = padding_mask(tokens)?;
        let embedded = self.embedding.forward(tokens)?;
        let encoded = match rng {
            Some(rng) => self.encoder.encode_train(&embedded, &mask, rng)?,
            None => self.encoder.encode(&embedded, &mask)?,
        };
        let pooled = masked_mean_pool(&encoded, &mask)?;
        let context = pooled.add(&self.opinion_proj.forward(opinion)?)?;
        Ok(self.head.forward(&context)?.tanh()?)
    }

    fn check_inputs(&self, tokens: &Tensor, opinion: &Tensor) -> ModelResult<()> {
        if tokens.dtype() != DType::U32 {
            return Err(ModelError::ShapeMismatch {
                what: "token dtype",
                expected: "u32".into(),
                found: format!("{:?}", tokens.dtype()),
            });
        }
        let (batch, _) = tokens.dims2().map_err(|_| ModelError::ShapeMismatch {
            what: "tokens",
            expected: "[batch, seq_len]".into(),
            found: format!("{:?}", tokens.dims()),
        })?;
        if opinion.dims() != [batch, self.config.opinion_dim] {
            return Err(ModelError::ShapeMismatch {
                what: "opinion",
                expected: format!("[{batch}, {}]", self.config.opinion_dim),
                found: format!("{:?}", opinion.dims()),
            });
        }
        Ok(())
    }

    /// Predicts a single row.
    pub fn predict_one(&self, tokens: &[u32], opinion: &[f32]) -> ModelResult<Vec<f32>> {
        let rows = self.predict_batch(&[tokens.to_vec()], &[opinion.to_vec()])?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    /// Predicts many independent rows in one pass. Every token row must have
    /// the same length.
    pub fn predict_batch(&self, tokens: &[Vec<u32>], opinions: &[Vec<f32>]) -> ModelResult<Vec<Vec<f32>>> {
        let tokens = stack_rows(tokens, "tokens", self.device())?;
        let opinions = stack_rows(opinions, "opinion", self.device())?;
        Ok(self.forward(&tokens, &opinions)?.to_vec2::<f32>()?)
    }
}

/// Packs equally long rows into a `[rows, width]` tensor.
pub(crate) fn stack_rows<T: candle_core::WithDType>(
    rows: &[Vec<T>],
    what: &'static str,
    device: &Device,
) -> ModelResult<Tensor> {
    let width = rows.first().map_or(0, Vec::len);
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(ModelError::ShapeMismatch {
            what,
            expected: format!("rows of length {width}"),
            found: format!("row of length {}", bad.len()),
        });
    }
    let flat: Vec<T> = rows.iter().flatten().copied().collect();
    Ok(Tensor::from_vec(flat, (rows.len(), width), device)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::IdentityEncoder;

    fn config() -> ModelConfig {
        ModelConfig {
            dropout: 0.0,
            ..Default::default()
        }
    }

    fn model() -> OpinionModel {
        OpinionModel::new(&config(), 12, 42, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_output_shape() {
        let model = model();
        let out = model
            .predict_batch(
                &[vec![1, 2, 3, 0, 0, 0], vec![4, 5, 0, 0, 0, 0]],
                &[vec![0.2, -0.1, 0.1], vec![-0.3, 0.4, -0.2]],
            )
            .unwrap();

        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|row| row.len() == 3));
    }

    #[test]
    fn test_output_strictly_bounded() {
        let model = model();
        let out = model
            .predict_one(&[7, 8, 9, 10, 11, 1], &[1.0, -1.0, 1.0])
            .unwrap();

        assert!(out.iter().all(|v| *v > -1.0 && *v < 1.0), "{out:?}");
    }

    #[test]
    fn test_all_padding_row_is_finite() {
        let model = model();
        let out = model.predict_one(&[0; 6], &[0.5, 0.5, 0.5]).unwrap();

        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_extra_padding_does_not_change_prediction() {
        let model = model();
        let opinion = [0.1, -0.2, 0.3];

        let short = model.predict_one(&[3, 4, 5, 0], &opinion).unwrap();
        let long = model.predict_one(&[3, 4, 5, 0, 0, 0], &opinion).unwrap();

        for (a, b) in short.iter().zip(&long) {
            assert!((a - b).abs() < 1e-5, "{a} vs {b}");
        }
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let a = model().predict_one(&[1, 2, 0, 0, 0, 0], &[0.0, 0.0, 0.0]).unwrap();
        let b = model().predict_one(&[1, 2, 0, 0, 0, 0], &[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_opinion_dimension_checked() {
        let err = model().predict_one(&[1, 2, 0, 0, 0, 0], &[0.0, 0.0]).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { what: "opinion", .. }));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = model()
            .predict_batch(&[vec![1, 2, 0], vec![1, 2]], &[vec![0.0; 3], vec![0.0; 3]])
            .unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { what: "tokens", .. }));
    }

    #[test]
    fn test_token_dtype_checked() {
        let model = model();
        let tokens = Tensor::zeros((1, 6), DType::F32, &Device::Cpu).unwrap();
        let opinion = Tensor::zeros((1, 3), DType::F32, &Device::Cpu).unwrap();

        let err = model.forward(&tokens, &opinion).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { what: "token dtype", .. }));
    }

    #[test]
    fn test_masked_mean_pool_ignores_padding() {
        let dev = Device::Cpu;
        let encoded = Tensor::new(
            &[
                [[1.0f32, 2.0], [3.0, 4.0], [100.0, 100.0]],
                [[9.0, 9.0], [9.0, 9.0], [9.0, 9.0]],
            ],
            &dev,
        )
        .unwrap();
        let mask = Tensor::new(&[[0u8, 0, 1], [1, 1, 1]], &dev).unwrap();

        let pooled = masked_mean_pool(&encoded, &mask).unwrap().to_vec2::<f32>().unwrap();

        assert_eq!(pooled[0], vec![2.0, 3.0]);
        assert_eq!(pooled[1], vec![0.0, 0.0]);
    }

    #[test]
    fn test_masked_mean_pool_hides_non_finite_padding() {
        let dev = Device::Cpu;
        let encoded = Tensor::new(&[[[1.0f32], [f32::NAN]]], &dev).unwrap();
        let mask = Tensor::new(&[[0u8, 1]], &dev).unwrap();

        let pooled = masked_mean_pool(&encoded, &mask).unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(pooled[0], vec![1.0]);
    }

    #[test]
    fn test_identity_encoder_model_pools_embeddings() {
        let cfg = config();
        let store = ParamStore::new(5, &Device::Cpu);
        let model = OpinionModel::from_parts(&cfg, 6, store, IdentityEncoder).unwrap();

        // Padding id 0 appears in both rows; only the real tokens matter
        let a = model.predict_one(&[2, 3, 0, 0, 0, 0], &[0.1, 0.1, 0.1]).unwrap();
        let b = model.predict_one(&[3, 2, 0, 0, 0, 0], &[0.1, 0.1, 0.1]).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_padding_mask_marks_pad_id() {
        let tokens = Tensor::new(&[[5u32, 0, 2, 0]], &Device::Cpu).unwrap();
        let mask = padding_mask(&tokens).unwrap().to_vec2::<u8>().unwrap();
        assert_eq!(mask, vec![vec![0, 1, 0, 1]]);
    }
}
