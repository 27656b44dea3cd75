//! Sequence Encoder
//!
//! Stacked self-attention + feed-forward blocks that attend over non-padding
//! positions only. The model talks to the encoder through [`SequenceEncoder`]
//! so its masking and pooling can be exercised against simpler encoders.
//!
//! Shapes used throughout:
//! - `embedded`: `[batch, seq_len, d_model]` f32
//! - `padding_mask`: `[batch, seq_len]` u8, 1 at padding positions

use candle_core::{DType, Tensor, D};
use candle_nn::{Linear, Module};
use rand::rngs::SmallRng;

use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::layers::{linear, Dropout, LayerNorm};
use crate::params::ParamStore;

/// Additive attention bias for padding keys. Finite so a row made entirely
/// of padding still produces a finite (uniform) attention distribution.
const MASKED_SCORE: f64 = -1e9;

/// Maps an embedded sequence to an encoded sequence of the same shape.
pub trait SequenceEncoder {
    /// Inference pass.
    fn encode(&self, embedded: &Tensor, padding_mask: &Tensor) -> ModelResult<Tensor>;

    /// Training pass; encoders with stochastic layers draw from `rng`.
    fn encode_train(
        &self,
        embedded: &Tensor,
        padding_mask: &Tensor,
        _rng: &mut SmallRng,
    ) -> ModelResult<Tensor> {
        self.encode(embedded, padding_mask)
    }
}

/// Passes embeddings through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityEncoder;

impl SequenceEncoder for IdentityEncoder {
    fn encode(&self, embedded: &Tensor, _padding_mask: &Tensor) -> ModelResult<Tensor> {
        Ok(embedded.clone())
    }
}

/// Converts a `[batch, seq_len]` padding mask into a `[batch, 1, 1, seq_len]`
/// additive bias for attention scores.
fn key_padding_bias(padding_mask: &Tensor) -> ModelResult<Tensor> {
    let (batch, seq_len) = padding_mask.dims2()?;
    Ok(padding_mask
        .to_dtype(DType::F32)?
        .affine(MASKED_SCORE, 0.0)?
        .reshape((batch, 1, 1, seq_len))?)
}

/// Multi-head scaled dot-product self-attention.
#[derive(Debug, Clone)]
pub struct MultiHeadSelfAttention {
    /// Packed query/key/value projection, `d_model -> 3 * d_model`
    in_proj: Linear,
    out_proj: Linear,
    n_heads: usize,
    head_dim: usize,
    dropout: Dropout,
}

impl MultiHeadSelfAttention {
    pub fn new(store: &mut ParamStore, name: &str, config: &ModelConfig) -> ModelResult<Self> {
        let d = config.d_model;
        // Xavier-uniform over the packed projection, zero bias
        let bound = (6.0 / (d + 3 * d) as f64).sqrt();
        let in_weight = store.uniform(&format!("{name}.in_proj.weight"), &[3 * d, d], bound)?;
        let in_bias = store.constant(&format!("{name}.in_proj.bias"), &[3 * d], 0.0)?;

        let out_bound = 1.0 / (d as f64).sqrt();
        let out_weight = store.uniform(&format!("{name}.out_proj.weight"), &[d, d], out_bound)?;
        let out_bias = store.constant(&format!("{name}.out_proj.bias"), &[d], 0.0)?;

        Ok(Self {
            in_proj: Linear::new(in_weight, Some(in_bias)),
            out_proj: Linear::new(out_weight, Some(out_bias)),
            n_heads: config.n_heads,
            head_dim: config.head_dim(),
            dropout: Dropout::new(config.dropout),
        })
    }

    /// `[batch, seq, d_model] -> [batch, heads, seq, head_dim]`
    fn split_heads(&self, xs: &Tensor) -> ModelResult<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        Ok(xs
            .reshape((batch, seq_len, self.n_heads, self.head_dim))?
            .transpose(1, 2)?
            .contiguous()?)
    }

    pub fn forward(
        &self,
        xs: &Tensor,
        bias: &Tensor,
        rng: Option<&mut SmallRng>,
    ) -> ModelResult<Tensor> {
        let (batch, seq_len, d_model) = xs.dims3()?;
        let qkv = self.in_proj.forward(xs)?;
        let q = self.split_heads(&qkv.narrow(2, 0, d_model)?)?;
        let k = self.split_heads(&qkv.narrow(2, d_model, d_model)?)?;
        let v = self.split_heads(&qkv.narrow(2, 2 * d_model, d_model)?)?;

        // [batch, heads, seq, seq]
        let k_t = k.transpose(2, 3)?.contiguous()?;
        let scores = q
            .matmul(&k_t)?
            .affine(1.0 / (self.head_dim as f64).sqrt(), 0.0)?
            .broadcast_add(bias)?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let probs = self.dropout.forward(&probs, rng)?;

        let context = probs
            .matmul(&v)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, d_model))?;
        Ok(self.out_proj.forward(&context)?)
    }
}

/// One post-norm encoder block: self-attention then a ReLU feed-forward,
/// each wrapped in a residual connection followed by layer norm.
#[derive(Debug, Clone)]
pub struct EncoderLayer {
    self_attn: MultiHeadSelfAttention,
    linear1: Linear,
    linear2: Linear,
    norm1: LayerNorm,
    norm2: LayerNorm,
    dropout: Dropout,
}

impl EncoderLayer {
    pub fn new(store: &mut ParamStore, name: &str, config: &ModelConfig) -> ModelResult<Self> {
        Ok(Self {
            self_attn: MultiHeadSelfAttention::new(store, &format!("{name}.self_attn"), config)?,
            linear1: linear(store, &format!("{name}.linear1"), config.d_model, config.d_ff)?,
            linear2: linear(store, &format!("{name}.linear2"), config.d_ff, config.d_model)?,
            norm1: LayerNorm::new(store, &format!("{name}.norm1"), config.d_model)?,
            norm2: LayerNorm::new(store, &format!("{name}.norm2"), config.d_model)?,
            dropout: Dropout::new(config.dropout),
        })
    }

    pub fn forward(
        &self,
        xs: &Tensor,
        bias: &Tensor,
        mut rng: Option<&mut SmallRng>,
    ) -> ModelResult<Tensor> {
        let attn = self.self_attn.forward(xs, bias, rng.as_deref_mut())?;
        let attn = self.dropout.forward(&attn, rng.as_deref_mut())?;
        let xs = self.norm1.forward(&xs.add(&attn)?)?;

        let hidden = self.linear1.forward(&xs)?.relu()?;
        let hidden = self.dropout.forward(&hidden, rng.as_deref_mut())?;
        let ff = self.linear2.forward(&hidden)?;
        let ff = self.dropout.forward(&ff, rng)?;
        Ok(self.norm2.forward(&xs.add(&ff)?)?)
    }
}

/// Stack of [`EncoderLayer`]s sharing one padding mask.
#[derive(Debug, Clone)]
pub struct TransformerEncoder {
    layers: Vec<EncoderLayer>,
}

impl TransformerEncoder {
    pub fn new(store: &mut ParamStore, name: &str, config: &ModelConfig) -> ModelResult<Self> {
        config.validate()?;
        let layers = (0..config.n_layers)
            .map(|i| EncoderLayer::new(store, &format!("{name}.layers.{i}"), config))
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(Self { layers })
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    fn forward(
        &self,
        embedded: &Tensor,
        padding_mask: &Tensor,
        mut rng: Option<&mut SmallRng>,
    ) -> ModelResult<Tensor> {
        let (batch, seq_len, _) = embedded.dims3()?;
        let mask_dims = padding_mask.dims2()?;
        if mask_dims != (batch, seq_len) {
            return Err(ModelError::ShapeMismatch {
                what: "padding mask",
                expected: format!("[{batch}, {seq_len}]"),
                found: format!("{:?}", padding_mask.dims()),
            });
        }

        let bias = key_padding_bias(padding_mask)?;
        let mut xs = embedded.clone();
        for layer in &self.layers {
            xs = layer.forward(&xs, &bias, rng.as_deref_mut())?;
        }
        Ok(xs)
    }
}

impl SequenceEncoder for TransformerEncoder {
    fn encode(&self, embedded: &Tensor, padding_mask: &Tensor) -> ModelResult<Tensor> {
        self.forward(embedded, padding_mask, None)
    }

    fn encode_train(
        &self,
        embedded: &Tensor,
        padding_mask: &Tensor,
        rng: &mut SmallRng,
    ) -> ModelResult<Tensor> {
        self.forward(embedded, padding_mask, Some(rng))
    }
}
