//! Model and trainer hyperparameters.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Architecture of the opinion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Fixed token sequence length (longer texts are rejected)
    pub max_len: usize,
    /// Number of opinion topics
    pub opinion_dim: usize,
    /// Embedding and encoder width
    pub d_model: usize,
    /// Attention heads per encoder layer
    pub n_heads: usize,
    /// Stacked encoder layers
    pub n_layers: usize,
    /// Hidden width of each feed-forward block
    pub d_ff: usize,
    /// Dropout probability, applied only while training
    pub dropout: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_len: 6,
            opinion_dim: 3,
            d_model: 32,
            n_heads: 4,
            n_layers: 2,
            d_ff: 64,
            dropout: 0.1,
        }
    }
}

impl ModelConfig {
    pub fn head_dim(&self) -> usize {
        self.d_model / self.n_heads
    }

    pub fn validate(&self) -> ModelResult<()> {
        let positive = [
            ("max_len", self.max_len),
            ("opinion_dim", self.opinion_dim),
            ("d_model", self.d_model),
            ("n_heads", self.n_heads),
            ("d_ff", self.d_ff),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ModelError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.d_model % self.n_heads != 0 {
            return Err(ModelError::InvalidConfig(format!(
                "d_model {} is not divisible by n_heads {}",
                self.d_model, self.n_heads
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ModelError::InvalidConfig(format!(
                "dropout {} must be in [0, 1)",
                self.dropout
            )));
        }
        Ok(())
    }
}

/// Optimization schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Fixed number of full-batch epochs; there is no convergence check
    pub epochs: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Report the loss every this many epochs (epoch 0 included)
    pub log_every: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            epochs: 400,
            learning_rate: 1e-2,
            log_every: 100,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.log_every == 0 {
            return Err(ModelError::InvalidConfig("log_every must be positive".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ModelError::InvalidConfig(format!(
                "learning_rate {} must be positive",
                self.learning_rate
            )));
        }
        Ok(())
    }
}
