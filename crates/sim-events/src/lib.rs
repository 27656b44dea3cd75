//! Shared data types for the opinion simulation.
//!
//! This crate contains pure data structures with no model or simulation
//! logic. It is a dependency for all other crates in the workspace.

pub mod opinion;
pub mod scenario;
pub mod trace;

pub use opinion::{OpinionError, OpinionVector};
pub use scenario::{AgentSeed, Scenario, TrainingExample};
pub use trace::TraceRecord;
