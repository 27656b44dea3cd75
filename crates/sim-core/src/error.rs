//! Errors that can occur while configuring or running a simulation.

use opinion_model::ModelError;
use sim_events::OpinionError;

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Tokenizing, predicting or training failed
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Configuration could not be loaded or is inconsistent
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Two opinion vectors of different length were blended
    #[error(transparent)]
    Opinion(#[from] OpinionError),

    /// Writing the trace failed
    #[error("trace output error: {0}")]
    Trace(#[from] std::io::Error),

    /// Smoothing weight outside [0, 1]
    #[error("smoothing weight {0} must be within [0, 1]")]
    InvalidAlpha(f32),

    /// An agent's opinion does not fit the model
    #[error("agent '{agent}' has {found} opinion components, model expects {expected}")]
    DimensionMismatch {
        agent: String,
        expected: usize,
        found: usize,
    },
}
