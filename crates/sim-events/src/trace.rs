//! Trace Records
//!
//! Everything a run reports: training progress and per-step opinion updates.
//! Each record has a fixed console rendering and serializes to one JSON line.

use serde::{Deserialize, Serialize};

use crate::OpinionVector;

/// A single observable fact about a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceRecord {
    /// Training is about to begin
    TrainingStarted {
        examples: usize,
        vocab_size: usize,
        epochs: usize,
    },
    /// Loss reported at a logging epoch
    EpochLoss { epoch: usize, loss: f32 },
    /// A timeline event is about to be applied
    StepStarted { step: usize, event: String },
    /// One agent's opinion after applying a step
    AgentUpdated {
        step: usize,
        agent: String,
        opinion: OpinionVector,
    },
    /// A timeline event was not applied
    StepSkipped {
        step: usize,
        event: String,
        reason: String,
    },
    /// The timeline has been fully replayed
    RunFinished { steps: usize, skipped: usize },
}

impl TraceRecord {
    /// Serializes the record to a single JSON line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes a record from a JSON line.
    pub fn from_jsonl(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// Human-readable console line, if this record has one.
    pub fn console_line(&self) -> Option<String> {
        match self {
            TraceRecord::EpochLoss { epoch, loss } => {
                Some(format!("epoch {:03} loss {:.4}", epoch, loss))
            }
            TraceRecord::StepStarted { step, event } => Some(format!("\nStep {}: {}", step, event)),
            TraceRecord::AgentUpdated { agent, opinion, .. } => {
                Some(format!("  {}: {}", agent, opinion))
            }
            TraceRecord::StepSkipped {
                step,
                event,
                reason,
            } => Some(format!("\nStep {}: {} (skipped: {})", step, event, reason)),
            TraceRecord::TrainingStarted { .. } | TraceRecord::RunFinished { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epoch_line_format() {
        let record = TraceRecord::EpochLoss {
            epoch: 0,
            loss: 0.123456,
        };
        assert_eq!(record.console_line().unwrap(), "epoch 000 loss 0.1235");

        let record = TraceRecord::EpochLoss {
            epoch: 300,
            loss: 0.0042,
        };
        assert_eq!(record.console_line().unwrap(), "epoch 300 loss 0.0042");
    }

    #[test]
    fn test_step_lines_format() {
        let step = TraceRecord::StepStarted {
            step: 2,
            event: "green jobs program".into(),
        };
        assert_eq!(step.console_line().unwrap(), "\nStep 2: green jobs program");

        let agent = TraceRecord::AgentUpdated {
            step: 2,
            agent: "Ava".into(),
            opinion: OpinionVector::from([0.25, -0.5, 0.0]),
        };
        assert_eq!(
            agent.console_line().unwrap(),
            "  Ava: [0.2500, -0.5000, 0.0000]"
        );
    }

    #[test]
    fn test_bookkeeping_records_are_silent() {
        let record = TraceRecord::RunFinished {
            steps: 5,
            skipped: 0,
        };
        assert!(record.console_line().is_none());
    }

    #[test]
    fn test_jsonl_is_tagged() {
        let record = TraceRecord::StepSkipped {
            step: 3,
            event: "alien landing".into(),
            reason: "word 'alien' is not in the vocabulary".into(),
        };

        let line = record.to_jsonl().unwrap();
        assert!(line.contains(r#""kind":"step_skipped""#));

        let parsed = TraceRecord::from_jsonl(&line).unwrap();
        assert_eq!(parsed, record);
    }
}
