//! Bundled demonstration models.

pub mod couples;
pub mod households;
pub mod two_clocks;

use std::sync::Arc;

use ms_simulation::{ModelSchema, SimResult, Simulation, Time};

/// A model the CLI can run.
pub struct ModelInfo {
    /// Name used on the command line.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Default horizon.
    pub horizon: Time,
    /// Register the entity types.
    pub build: fn() -> SimResult<Arc<ModelSchema>>,
    /// Create the starting population of an initialized run.
    pub populate: fn(&mut Simulation) -> SimResult<()>,
    /// Short model-specific note on the final state.
    pub describe: fn(&Simulation) -> SimResult<String>,
}

pub const MODELS: &[ModelInfo] = &[two_clocks::INFO, couples::INFO, households::INFO];

pub fn find(name: &str) -> Option<&'static ModelInfo> {
    MODELS.iter().find(|m| m.name.eq_ignore_ascii_case(name))
}

/// Exponential waiting time with the given mean, drawn from `stream`.
pub fn exponential(sim: &mut Simulation, stream: u32, mean: f64) -> Time {
    -mean * (1.0 - sim.random().uniform(stream)).ln()
}
