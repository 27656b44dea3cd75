//! Core simulation logic: agents, the smoothing loop, configuration and the
//! end-to-end runner that trains the opinion model and replays a timeline.
//!
//! # Modules
//!
//! - [`agent`]: Named agents and the ordered [`Roster`]
//! - [`simulation`]: The [`OpinionPredictor`] seam and the step loop
//! - [`config`]: TOML configuration covering every component
//! - [`output`]: Console and JSONL trace writer
//! - [`runner`]: Wires vocabulary, training and simulation together

pub mod agent;
pub mod config;
pub mod error;
pub mod output;
pub mod runner;
pub mod simulation;

pub use agent::{Agent, Roster};
pub use config::{default_config_toml, ConfigError, GeneralConfig, SimConfig};
pub use error::SimError;
pub use output::TraceLogger;
pub use runner::{run, RunSummary};
pub use simulation::{
    AgentUpdate, OpinionPredictor, Simulation, SimulationConfig, StepOutcome, StepReport,
    UnknownWordPolicy,
};
