#![deny(missing_docs)]

//! Weighted-ensemble population control for rare-event sampling.
//!
//! A cycle pushes the whole [`Population`] through stepping, progress
//! evaluation, [`Binner`], [`Recycler`], a second evaluation of the recycled
//! walkers, a second binning pass and the [`SplitMerger`]. Every stage
//! conserves total weight; recycled weight is reported as flux and
//! accumulated in an explicit [`FluxLedger`].

/// Checkpoint inspection helpers.
pub mod analysis;
/// One-dimensional bin assignment.
pub mod binner;
/// Checkpoint payloads, atomic writes and retention.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// The cycle loop and its `run`/`resume` entry points.
pub mod controller;
/// Deterministic seed derivation helpers.
pub mod determinism;
/// Run manifest serialization helpers.
pub mod manifest;
/// Per-cycle records and the CSV cycle log.
pub mod metrics;
/// Boundary detection, recycling and flux accounting.
pub mod recycler;
/// Split/merge resampling.
pub mod splitmerge;
/// Walkers and populations.
pub mod walker;

pub use analysis::{summarize, CheckpointSummary};
pub use binner::Binner;
pub use checkpoint::{CheckpointPayload, Checkpointer};
pub use config::{CheckpointConfig, OutputConfig, RunConfig, SeedPolicy};
pub use controller::{resume, run, Phase, RunSummary};
pub use metrics::{CycleLog, CycleRecord, ProgressLog};
pub use recycler::{Boundary, Direction, FluxLedger, RecycleReport, Recycler};
pub use splitmerge::{ResampleReport, SplitMerger};
pub use walker::{BinStats, Population, Walker, WalkerId, WalkerState};
