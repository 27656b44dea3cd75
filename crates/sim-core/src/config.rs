//! Configuration loading for the simulation.
//!
//! All settings, including the scenario itself, can be loaded from a TOML
//! file. Every table is optional and falls back to the built-in defaults.

use opinion_model::{ModelConfig, TrainerConfig};
use serde::{Deserialize, Serialize};
use sim_events::Scenario;
use std::path::Path;

use crate::simulation::SimulationConfig;

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SimConfig {
    /// Seeding and device selection
    #[serde(default)]
    pub general: GeneralConfig,
    /// Model architecture
    #[serde(default)]
    pub model: ModelConfig,
    /// Optimization schedule
    #[serde(default)]
    pub trainer: TrainerConfig,
    /// Smoothing and unknown-word policy
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Training data, agents and timeline
    #[serde(default)]
    pub scenario: Scenario,
}

impl SimConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Serializes the configuration as pretty TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Checks that the parts of the configuration agree with each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.trainer
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.simulation
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let dim = self.model.opinion_dim;
        for (label, opinion) in self.scenario.opinion_vectors() {
            if opinion.dim() != dim {
                return Err(ConfigError::Invalid(format!(
                    "{label} has {} components, opinion_dim is {dim}",
                    opinion.dim()
                )));
            }
            if !opinion.is_bounded() {
                return Err(ConfigError::Invalid(format!(
                    "{label} is {opinion}, components must lie within [-1, 1]"
                )));
            }
        }
        if self.scenario.training.is_empty() {
            return Err(ConfigError::Invalid("scenario has no training examples".into()));
        }
        Ok(())
    }
}

/// General run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Seed for parameter initialization and dropout masks
    pub seed: u64,
    /// Use a CUDA device when one is available
    pub prefer_gpu: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            prefer_gpu: true,
        }
    }
}

/// Returns the default configuration as a TOML string.
pub fn default_config_toml() -> Result<String, ConfigError> {
    SimConfig::default().to_toml()
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error parsing TOML config
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Error writing TOML
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    /// Settings that parse but cannot be used together
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
