//! Scenario Data
//!
//! The training set, agent roster and event timeline a run is driven by.
//! The built-in scenario is plain data; callers pass it (or a scenario loaded
//! from configuration) into the trainer and the simulation explicitly.

use serde::{Deserialize, Serialize};

use crate::OpinionVector;

/// One supervised sample: how `text` moved an opinion from `start` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub start: OpinionVector,
    pub target: OpinionVector,
}

impl TrainingExample {
    pub fn new(
        text: impl Into<String>,
        start: impl Into<OpinionVector>,
        target: impl Into<OpinionVector>,
    ) -> Self {
        Self {
            text: text.into(),
            start: start.into(),
            target: target.into(),
        }
    }
}

/// Initial state for a named agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub name: String,
    pub opinion: OpinionVector,
}

impl AgentSeed {
    pub fn new(name: impl Into<String>, opinion: impl Into<OpinionVector>) -> Self {
        Self {
            name: name.into(),
            opinion: opinion.into(),
        }
    }
}

/// Everything a run consumes: training data, roster, and the event timeline.
///
/// Fields missing from a deserialized scenario fall back to the built-in ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    /// Events replayed in order against every agent
    pub timeline: Vec<String>,
    /// Supervised samples the model is fitted to
    pub training: Vec<TrainingExample>,
    /// Agents and their starting opinions, in reporting order
    pub agents: Vec<AgentSeed>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Scenario {
    /// The stock scenario: 8 training samples over three topics, three
    /// agents and a five-event timeline.
    pub fn builtin() -> Self {
        Self {
            training: builtin_training_set(),
            agents: builtin_agents(),
            timeline: builtin_timeline(),
        }
    }

    /// Every opinion vector in the scenario, labelled by where it came from.
    pub fn opinion_vectors(&self) -> impl Iterator<Item = (String, &OpinionVector)> {
        let training = self.training.iter().flat_map(|ex| {
            [
                (format!("training '{}' start", ex.text), &ex.start),
                (format!("training '{}' target", ex.text), &ex.target),
            ]
        });
        let agents = self
            .agents
            .iter()
            .map(|a| (format!("agent '{}'", a.name), &a.opinion));
        training.chain(agents)
    }
}

fn builtin_training_set() -> Vec<TrainingExample> {
    vec![
        TrainingExample::new("climate change urgent action", [0.1, -0.2, 0.0], [0.8, -0.3, 0.2]),
        TrainingExample::new("renewable energy breakthrough", [0.3, -0.1, 0.2], [0.9, -0.1, 0.5]),
        TrainingExample::new("tax cuts boost economy", [-0.2, 0.2, 0.1], [-0.4, 0.8, 0.2]),
        TrainingExample::new("automation job loss fears", [-0.1, 0.3, 0.4], [-0.2, 0.1, -0.6]),
        TrainingExample::new("ai ethics regulation", [0.0, -0.2, 0.5], [0.2, -0.4, 0.3]),
        TrainingExample::new("economic downturn recession", [0.2, 0.4, -0.1], [0.3, -0.6, -0.3]),
        TrainingExample::new("tech innovation boom", [0.1, -0.3, 0.2], [0.2, -0.2, 0.8]),
        TrainingExample::new("green jobs program", [0.4, -0.1, 0.0], [0.9, 0.3, 0.1]),
    ]
}

fn builtin_agents() -> Vec<AgentSeed> {
    vec![
        AgentSeed::new("Ava", [0.2, -0.1, 0.1]),
        AgentSeed::new("Ben", [-0.3, 0.4, -0.2]),
        AgentSeed::new("Chen", [0.5, -0.2, 0.6]),
    ]
}

fn builtin_timeline() -> Vec<String> {
    [
        "climate change urgent action",
        "green jobs program",
        "tax cuts boost economy",
        "automation job loss fears",
        "tech innovation boom",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_sizes() {
        let scenario = Scenario::builtin();

        assert_eq!(scenario.training.len(), 8);
        assert_eq!(scenario.agents.len(), 3);
        assert_eq!(scenario.timeline.len(), 5);
    }

    #[test]
    fn test_builtin_vectors_are_three_dimensional() {
        let scenario = Scenario::builtin();

        for (label, opinion) in scenario.opinion_vectors() {
            assert_eq!(opinion.dim(), 3, "{} has wrong dimension", label);
            assert!(opinion.is_bounded(), "{} out of range", label);
        }
    }

    #[test]
    fn test_builtin_roster_order() {
        let names: Vec<_> = Scenario::builtin()
            .agents
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, vec!["Ava", "Ben", "Chen"]);
    }

    #[test]
    fn test_partial_scenario_keeps_builtin_fields() {
        let parsed: Scenario =
            serde_json::from_str(r#"{"timeline": ["tech innovation boom"]}"#).unwrap();

        assert_eq!(parsed.timeline, vec!["tech innovation boom"]);
        assert_eq!(parsed.training.len(), 8);
        assert_eq!(parsed.agents.len(), 3);
    }

    #[test]
    fn test_scenario_json_roundtrip() {
        let scenario = Scenario::builtin();
        let json = serde_json::to_string(&scenario).unwrap();
        let parsed: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scenario);
    }
}
