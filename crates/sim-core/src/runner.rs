//! End-to-end run: build the vocabulary, train the model, replay the timeline.

use opinion_model::{
    select_device, OpinionModel, Tokenizer, Trainer, TrainingBatch, TrainingReport, Vocabulary,
};
use sim_events::{OpinionVector, TraceRecord};

use crate::agent::Roster;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::output::TraceLogger;
use crate::simulation::{Simulation, StepReport};

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub vocab_size: usize,
    pub training: TrainingReport,
    pub steps: Vec<StepReport>,
    /// Agents with their final opinions
    pub roster: Roster,
}

impl RunSummary {
    /// Opinions `agent` held after each applied step, in order.
    pub fn history_of(&self, agent: &str) -> Vec<&OpinionVector> {
        self.steps
            .iter()
            .flat_map(|s| s.updates())
            .filter(|u| u.agent == agent)
            .map(|u| &u.opinion)
            .collect()
    }

    pub fn skipped_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.is_skipped()).count()
    }
}

/// Runs the configured scenario, writing the trace to `logger`.
pub fn run(config: &SimConfig, logger: &mut TraceLogger) -> Result<RunSummary, SimError> {
    config.validate()?;
    let scenario = &config.scenario;

    let vocab = Vocabulary::from_texts(scenario.training.iter().map(|e| e.text.as_str()));
    let tokenizer = Tokenizer::new(vocab, config.model.max_len);
    for event in &scenario.timeline {
        tokenizer.check_len(event)?;
        let unknown = tokenizer.unknown_words(event);
        if !unknown.is_empty() {
            tracing::warn!(event = %event, ?unknown, "Timeline event uses words outside the training vocabulary");
        }
    }

    let device = select_device(config.general.prefer_gpu)?;
    tracing::info!(?device, vocab_size = tokenizer.vocab().len(), "Building model");
    let mut model = OpinionModel::new(
        &config.model,
        tokenizer.vocab().len(),
        config.general.seed,
        &device,
    )?;
    let batch = TrainingBatch::build(
        &scenario.training,
        &tokenizer,
        config.model.opinion_dim,
        &device,
    )?;

    logger.log(&TraceRecord::TrainingStarted {
        examples: batch.rows(),
        vocab_size: tokenizer.vocab().len(),
        epochs: config.trainer.epochs,
    })?;

    let trainer = Trainer::new(config.trainer.clone(), config.general.seed.wrapping_add(1));
    let mut trace_result = Ok(());
    let training = trainer.train(&mut model, &batch, |progress| {
        if trace_result.is_ok() {
            trace_result = logger.log(&TraceRecord::EpochLoss {
                epoch: progress.epoch,
                loss: progress.loss,
            });
        }
    })?;
    trace_result?;

    // Parameters are frozen from here on: the simulation only borrows the model.
    let model = model;
    let mut simulation = Simulation::new(
        &model,
        &tokenizer,
        Roster::from_seeds(&scenario.agents),
        config.simulation.clone(),
    )?;

    let mut trace_result = Ok(());
    let steps = simulation.run(scenario.timeline.iter().map(String::as_str), |report| {
        if trace_result.is_ok() {
            trace_result = logger.log_batch(&report.trace_records());
        }
    })?;
    trace_result?;

    let summary = RunSummary {
        vocab_size: tokenizer.vocab().len(),
        training,
        steps,
        roster: simulation.into_roster(),
    };

    logger.log(&TraceRecord::RunFinished {
        steps: summary.steps.len(),
        skipped: summary.skipped_steps(),
    })?;
    logger.flush()?;

    tracing::info!(
        steps = summary.steps.len(),
        skipped = summary.skipped_steps(),
        final_loss = ?summary.training.final_loss,
        "Run complete"
    );
    Ok(summary)
}
