//! Trainer
//!
//! Full-batch Adam on mean squared error for a fixed number of epochs.
//! Training is the only place model parameters change.

use candle_core::{Device, Tensor};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use sim_events::TrainingExample;

use crate::config::TrainerConfig;
use crate::encoder::SequenceEncoder;
use crate::error::{ModelError, ModelResult};
use crate::model::{stack_rows, OpinionModel};
use crate::tokenizer::Tokenizer;

/// The whole dataset as tensors.
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    /// `[rows, max_len]` u32
    pub tokens: Tensor,
    /// `[rows, opinion_dim]` f32
    pub start: Tensor,
    /// `[rows, opinion_dim]` f32
    pub target: Tensor,
    rows: usize,
}

impl TrainingBatch {
    /// Tokenizes, pads and stacks every example.
    pub fn build(
        examples: &[TrainingExample],
        tokenizer: &Tokenizer,
        opinion_dim: usize,
        device: &Device,
    ) -> ModelResult<Self> {
        if examples.is_empty() {
            return Err(ModelError::InvalidConfig("training set is empty".into()));
        }

        let mut tokens = Vec::with_capacity(examples.len());
        let mut start = Vec::with_capacity(examples.len());
        let mut target = Vec::with_capacity(examples.len());
        for example in examples {
            for vector in [&example.start, &example.target] {
                vector.expect_dim(opinion_dim).map_err(|e| ModelError::ShapeMismatch {
                    what: "training opinion",
                    expected: e.expected.to_string(),
                    found: format!("{} in '{}'", e.found, example.text),
                })?;
            }
            tokens.push(tokenizer.encode_padded(&example.text)?);
            start.push(example.start.as_slice().to_vec());
            target.push(example.target.as_slice().to_vec());
        }

        Ok(Self {
            tokens: stack_rows(&tokens, "tokens", device)?,
            start: stack_rows(&start, "opinion", device)?,
            target: stack_rows(&target, "opinion", device)?,
            rows: examples.len(),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Loss observed at a logging epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochLoss {
    pub epoch: usize,
    pub loss: f32,
}

/// What a training run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    /// Losses at every logging epoch
    pub history: Vec<EpochLoss>,
    /// Loss of the last epoch run, if any
    pub final_loss: Option<f32>,
    pub epochs: usize,
}

/// Fits a model to a [`TrainingBatch`].
#[derive(Debug, Clone)]
pub struct Trainer {
    config: TrainerConfig,
    seed: u64,
}

impl Trainer {
    /// `seed` drives the dropout masks.
    pub fn new(config: TrainerConfig, seed: u64) -> Self {
        Self { config, seed }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Runs every configured epoch: forward, MSE, one Adam step. Every
    /// `log_every`-th epoch the pre-step loss is passed to `on_progress`.
    pub fn train<E: SequenceEncoder>(
        &self,
        model: &mut OpinionModel<E>,
        batch: &TrainingBatch,
        mut on_progress: impl FnMut(&EpochLoss),
    ) -> ModelResult<TrainingReport> {
        self.config.validate()?;

        let params = ParamsAdamW {
            lr: self.config.learning_rate,
            weight_decay: 0.0,
            ..Default::default()
        };
        let mut optimizer = AdamW::new(model.params().vars(), params)?;
        let mut rng = SmallRng::seed_from_u64(self.seed);

        tracing::info!(
            rows = batch.rows(),
            epochs = self.config.epochs,
            lr = self.config.learning_rate,
            "Training opinion model"
        );

        let mut report = TrainingReport {
            epochs: self.config.epochs,
            ..Default::default()
        };
        for epoch in 0..self.config.epochs {
            let predicted = model.forward_train(&batch.tokens, &batch.start, &mut rng)?;
            let loss = candle_nn::loss::mse(&predicted, &batch.target)?;
            optimizer.backward_step(&loss)?;

            let value = loss.to_scalar::<f32>()?;
            report.final_loss = Some(value);

            if epoch % self.config.log_every == 0 {
                let progress = EpochLoss { epoch, loss: value };
                tracing::info!(epoch, loss = value, "Training progress");
                on_progress(&progress);
                report.history.push(progress);
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::vocab::Vocabulary;
    use sim_events::Scenario;

    fn setup(dropout: f32) -> (OpinionModel, TrainingBatch) {
        let scenario = Scenario::builtin();
        let vocab = Vocabulary::from_texts(scenario.training.iter().map(|e| e.text.as_str()));
        let config = ModelConfig {
            dropout,
            ..Default::default()
        };
        let tokenizer = Tokenizer::new(vocab, config.max_len);
        let model = OpinionModel::new(&config, tokenizer.vocab().len(), 42, &Device::Cpu).unwrap();
        let batch = TrainingBatch::build(&scenario.training, &tokenizer, 3, &Device::Cpu).unwrap();
        (model, batch)
    }

    #[test]
    fn test_batch_shapes() {
        let (_, batch) = setup(0.0);

        assert_eq!(batch.rows(), 8);
        assert_eq!(batch.tokens.dims(), &[8, 6]);
        assert_eq!(batch.start.dims(), &[8, 3]);
        assert_eq!(batch.target.dims(), &[8, 3]);
    }

    #[test]
    fn test_batch_rejects_wrong_dimension() {
        let vocab = Vocabulary::from_texts(["storm"]);
        let tokenizer = Tokenizer::new(vocab, 6);
        let examples = vec![TrainingExample::new("storm", [0.1, 0.2], [0.3, 0.4, 0.5])];

        let err = TrainingBatch::build(&examples, &tokenizer, 3, &Device::Cpu).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { what: "training opinion", .. }));
    }

    #[test]
    fn test_batch_rejects_long_text() {
        let text = "one two three four five six seven";
        let vocab = Vocabulary::from_texts([text]);
        let tokenizer = Tokenizer::new(vocab, 6);
        let examples = vec![TrainingExample::new(text, [0.0; 3], [0.0; 3])];

        let err = TrainingBatch::build(&examples, &tokenizer, 3, &Device::Cpu).unwrap_err();
        assert!(matches!(err, ModelError::SequenceTooLong { length: 7, max: 6 }));
    }

    #[test]
    fn test_loss_decreases() {
        let (mut model, batch) = setup(0.0);
        let trainer = Trainer::new(
            TrainerConfig {
                epochs: 60,
                log_every: 10,
                ..Default::default()
            },
            7,
        );

        let report = trainer.train(&mut model, &batch, |_| {}).unwrap();

        let first = report.history.first().unwrap().loss;
        let last = report.final_loss.unwrap();
        assert!(last < first, "loss went from {first} to {last}");
    }

    #[test]
    fn test_progress_reported_every_log_interval() {
        let (mut model, batch) = setup(0.1);
        let trainer = Trainer::new(
            TrainerConfig {
                epochs: 25,
                log_every: 10,
                ..Default::default()
            },
            7,
        );

        let mut seen = Vec::new();
        let report = trainer
            .train(&mut model, &batch, |p| seen.push(p.epoch))
            .unwrap();

        assert_eq!(seen, vec![0, 10, 20]);
        assert_eq!(report.history.len(), 3);
        assert_eq!(report.epochs, 25);
    }

    #[test]
    fn test_training_is_reproducible_with_dropout() {
        let config = TrainerConfig {
            epochs: 15,
            log_every: 5,
            ..Default::default()
        };

        let (mut a, batch_a) = setup(0.1);
        let (mut b, batch_b) = setup(0.1);
        let ra = Trainer::new(config.clone(), 3).train(&mut a, &batch_a, |_| {}).unwrap();
        let rb = Trainer::new(config, 3).train(&mut b, &batch_b, |_| {}).unwrap();

        assert_eq!(ra, rb);
    }

    #[test]
    fn test_zero_epochs_is_a_no_op() {
        let (mut model, batch) = setup(0.0);
        let before = model.predict_one(&[1, 2, 0, 0, 0, 0], &[0.1, 0.1, 0.1]).unwrap();

        let report = Trainer::new(
            TrainerConfig {
                epochs: 0,
                ..Default::default()
            },
            1,
        )
        .train(&mut model, &batch, |_| {})
        .unwrap();

        assert!(report.history.is_empty());
        assert_eq!(report.final_loss, None);
        let after = model.predict_one(&[1, 2, 0, 0, 0, 0], &[0.1, 0.1, 0.1]).unwrap();
        assert_eq!(before, after);
    }
}
