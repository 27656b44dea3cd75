//! Opinion model: vocabulary, tokenizer, transformer encoder and trainer.
//!
//! # Modules
//!
//! - [`vocab`]: Word → id table with a reserved padding id
//! - [`tokenizer`]: Encoding and padding of event text
//! - [`encoder`]: The [`SequenceEncoder`] seam and the transformer stack
//! - [`model`]: [`OpinionModel`], masked pooling and the prediction head
//! - [`trainer`]: Full-batch Adam training loop
//! - [`params`]: Seeded parameter initialization

pub mod config;
pub mod encoder;
pub mod error;
pub mod layers;
pub mod model;
pub mod params;
pub mod tokenizer;
pub mod trainer;
pub mod vocab;

pub use config::{ModelConfig, TrainerConfig};
pub use encoder::{IdentityEncoder, SequenceEncoder, TransformerEncoder};
pub use error::{ModelError, ModelResult};
pub use model::{masked_mean_pool, padding_mask, select_device, OpinionModel};
pub use params::ParamStore;
pub use tokenizer::{encode, pad_to, Tokenizer};
pub use trainer::{EpochLoss, Trainer, TrainingBatch, TrainingReport};
pub use vocab::{Vocabulary, PAD_ID, PAD_TOKEN};
