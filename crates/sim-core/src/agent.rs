//! Agents
//!
//! Named holders of an opinion vector. The roster keeps agents in the order
//! they were seeded, which is also the order steps are applied and reported.

use sim_events::{AgentSeed, OpinionVector};

use crate::error::SimError;

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub name: String,
    pub opinion: OpinionVector,
}

impl Agent {
    pub fn new(name: impl Into<String>, opinion: impl Into<OpinionVector>) -> Self {
        Self {
            name: name.into(),
            opinion: opinion.into(),
        }
    }
}

impl From<&AgentSeed> for Agent {
    fn from(seed: &AgentSeed) -> Self {
        Self::new(seed.name.clone(), seed.opinion.clone())
    }
}

/// Ordered collection of agents sharing one opinion dimension.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    agents: Vec<Agent>,
}

impl Roster {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self { agents }
    }

    pub fn from_seeds(seeds: &[AgentSeed]) -> Self {
        Self::new(seeds.iter().map(Agent::from).collect())
    }

    /// Fails on the first agent whose opinion is not `dim` long.
    pub fn check_dim(&self, dim: usize) -> Result<(), SimError> {
        match self.agents.iter().find(|a| a.opinion.dim() != dim) {
            Some(agent) => Err(SimError::DimensionMismatch {
                agent: agent.name.clone(),
                expected: dim,
                found: agent.opinion.dim(),
            }),
            None => Ok(()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
