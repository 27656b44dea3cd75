//! Simulation Loop
//!
//! Replays a timeline of events against every agent. Each step tokenizes the
//! event once, asks the predictor for every agent's next opinion, and blends
//! it into the agent's current opinion by exponential smoothing:
//!
//! ```text
//! new = alpha * old + (1 - alpha) * predicted
//! ```
//!
//! The predictor is only borrowed; agent opinions are the only state that
//! changes.

use opinion_model::{ModelError, OpinionModel, SequenceEncoder, Tokenizer};
use serde::{Deserialize, Serialize};
use sim_events::{OpinionVector, TraceRecord};

use crate::agent::Roster;
use crate::error::SimError;

/// Anything that can predict the opinion an event pushes an agent towards.
pub trait OpinionPredictor {
    fn opinion_dim(&self) -> usize;

    fn predict(&self, tokens: &[u32], opinion: &OpinionVector) -> Result<OpinionVector, ModelError>;
}

impl<E: SequenceEncoder> OpinionPredictor for OpinionModel<E> {
    fn opinion_dim(&self) -> usize {
        OpinionModel::opinion_dim(self)
    }

    fn predict(&self, tokens: &[u32], opinion: &OpinionVector) -> Result<OpinionVector, ModelError> {
        self.predict_one(tokens, opinion.as_slice())
            .map(OpinionVector::new)
    }
}

/// What to do when a timeline event contains a word the model never saw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnknownWordPolicy {
    /// Stop the run and report the missing word
    #[default]
    Abort,
    /// Leave every opinion unchanged for that event and continue
    SkipEvent,
}

/// Simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Weight kept on the prior opinion, in [0, 1]
    pub alpha: f32,
    pub on_unknown_word: UnknownWordPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            alpha: 0.7,
            on_unknown_word: UnknownWordPolicy::Abort,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), SimError> {
        if (0.0..=1.0).contains(&self.alpha) {
            Ok(())
        } else {
            Err(SimError::InvalidAlpha(self.alpha))
        }
    }
}

/// One agent's change during a step.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentUpdate {
    pub agent: String,
    pub previous: OpinionVector,
    pub predicted: OpinionVector,
    pub opinion: OpinionVector,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Every agent was updated, in roster order
    Applied(Vec<AgentUpdate>),
    /// Nobody was updated
    Skipped { reason: String },
}

/// Result of replaying a single event.
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    /// 1-based position in the timeline
    pub step: usize,
    pub event: String,
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn updates(&self) -> &[AgentUpdate] {
        match &self.outcome {
            StepOutcome::Applied(updates) => updates,
            StepOutcome::Skipped { .. } => &[],
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, StepOutcome::Skipped { .. })
    }

    /// The records this step contributes to the run trace.
    pub fn trace_records(&self) -> Vec<TraceRecord> {
        match &self.outcome {
            StepOutcome::Applied(updates) => {
                let mut records = Vec::with_capacity(updates.len() + 1);
                records.push(TraceRecord::StepStarted {
                    step: self.step,
                    event: self.event.clone(),
                });
                records.extend(updates.iter().map(|u| TraceRecord::AgentUpdated {
                    step: self.step,
                    agent: u.agent.clone(),
                    opinion: u.opinion.clone(),
                }));
                records
            }
            StepOutcome::Skipped { reason } => vec![TraceRecord::StepSkipped {
                step: self.step,
                event: self.event.clone(),
                reason: reason.clone(),
            }],
        }
    }
}

/// Drives a roster through a timeline with a borrowed predictor.
pub struct Simulation<'a, P> {
    predictor: &'a P,
    tokenizer: &'a Tokenizer,
    roster: Roster,
    config: SimulationConfig,
    steps_taken: usize,
}

impl<'a, P: OpinionPredictor> Simulation<'a, P> {
    pub fn new(
        predictor: &'a P,
        tokenizer: &'a Tokenizer,
        roster: Roster,
        config: SimulationConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;
        roster.check_dim(predictor.opinion_dim())?;
        Ok(Self {
            predictor,
            tokenizer,
            roster,
            config,
            steps_taken: 0,
        })
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn into_roster(self) -> Roster {
        self.roster
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    /// Applies one event to every agent.
    ///
    /// Predictions are computed for the whole roster before any opinion is
    /// written, so a failed step leaves every agent untouched.
    pub fn step(&mut self, event: &str) -> Result<StepReport, SimError> {
        let step = self.steps_taken + 1;

        let tokens = match self.tokenizer.encode_padded(event) {
            Ok(tokens) => tokens,
            Err(err @ ModelError::MissingWord { .. })
                if self.config.on_unknown_word == UnknownWordPolicy::SkipEvent =>
            {
                tracing::warn!(step, event, error = %err, "Skipping event");
                self.steps_taken = step;
                return Ok(StepReport {
                    step,
                    event: event.to_string(),
                    outcome: StepOutcome::Skipped {
                        reason: err.to_string(),
                    },
                });
            }
            Err(err) => return Err(err.into()),
        };

        let mut updates = Vec::with_capacity(self.roster.len());
        for agent in self.roster.iter() {
            let predicted = self.predictor.predict(&tokens, &agent.opinion)?;
            let opinion = agent.opinion.blend(&predicted, self.config.alpha)?;
            tracing::debug!(step, agent = %agent.name, %predicted, %opinion, "Agent updated");
            updates.push(AgentUpdate {
                agent: agent.name.clone(),
                previous: agent.opinion.clone(),
                predicted,
                opinion,
            });
        }

        for (agent, update) in self.roster.iter_mut().zip(&updates) {
            agent.opinion = update.opinion.clone();
        }
        self.steps_taken = step;

        Ok(StepReport {
            step,
            event: event.to_string(),
            outcome: StepOutcome::Applied(updates),
        })
    }

    /// Steps through `timeline` in order, handing each report to `on_step`.
    pub fn run<'e>(
        &mut self,
        timeline: impl IntoIterator<Item = &'e str>,
        mut on_step: impl FnMut(&StepReport),
    ) -> Result<Vec<StepReport>, SimError> {
        let mut reports = Vec::new();
        for event in timeline {
            let report = self.step(event)?;
            on_step(&report);
            reports.push(report);
        }
        Ok(reports)
    }
}
