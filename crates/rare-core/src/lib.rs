#![deny(missing_docs)]
#![doc = "Core traits and data types shared by the rare-event sampling drivers."]

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod provenance;
pub mod rng;
mod snapshot;

pub use errors::{ErrorInfo, RareError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use snapshot::Snapshot;

/// Identifies the unit of work handed to a [`Stepper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContext {
    /// Zero-based cycle index being advanced.
    pub cycle: usize,
    /// Raw identifier of the walker whose state is advanced.
    pub walker: u64,
}

/// Advances a physical state by one simulation cycle.
///
/// Implementations may block for an arbitrary external duration. A failed
/// advance must surface as [`RareError::Step`] and never return a partial state.
pub trait Stepper<S>: Send + Sync {
    /// Returns the state reached after one cycle starting from `state`.
    fn advance(&self, state: &S, ctx: &StepContext) -> Result<S, RareError>;
}

impl<S, F> Stepper<S> for F
where
    F: Fn(&S, &StepContext) -> Result<S, RareError> + Send + Sync,
{
    fn advance(&self, state: &S, ctx: &StepContext) -> Result<S, RareError> {
        self(state, ctx)
    }
}

/// Maps a physical state to its scalar progress coordinate.
pub trait ProgressCoordinate<S>: Send + Sync {
    /// Evaluates the coordinate. Must not mutate the state it observes.
    fn evaluate(&self, state: &S) -> Result<f64, RareError>;
}

impl<S, F> ProgressCoordinate<S> for F
where
    F: Fn(&S) -> Result<f64, RareError> + Send + Sync,
{
    fn evaluate(&self, state: &S) -> Result<f64, RareError> {
        self(state)
    }
}

/// Harmonic restraint applied during one umbrella window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restraint {
    /// Restraint center along the sampled coordinate.
    pub center: f64,
    /// Force constant in engine units.
    pub force_constant: f64,
    /// Rendered restraint file handed to the engine.
    pub contents: String,
}

/// Artefacts produced by one restrained window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowOutput {
    /// Final restart state of the window.
    pub final_state: Snapshot,
    /// Trajectory file, when the engine writes one.
    pub trajectory: Option<PathBuf>,
    /// Per-frame coordinate values along the trajectory.
    pub samples: Vec<f64>,
}

/// Runs a restrained simulation window and samples the coordinate per frame.
pub trait WindowSampler: Send + Sync {
    /// Runs window `window` from `start` under `restraint`.
    fn sample_window(
        &self,
        start: &Snapshot,
        restraint: &Restraint,
        window: usize,
    ) -> Result<WindowOutput, RareError>;
}
