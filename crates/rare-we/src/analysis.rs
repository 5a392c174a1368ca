use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::checkpoint::{CheckpointPayload, Checkpointer};
use crate::walker::BinStats;

/// Condensed view of a checkpoint for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointSummary {
    /// File the summary was read from.
    pub path: PathBuf,
    /// Completed cycles.
    pub cycle: usize,
    /// Master seed of the run.
    pub master_seed: u64,
    /// Walker count.
    pub walkers: usize,
    /// Total weight.
    pub total_weight: f64,
    /// Occupancy and weight per bin.
    pub bins: BTreeMap<usize, BinStats>,
    /// Cumulative flux per boundary.
    pub cumulative_flux: Vec<f64>,
    /// Mean flux per cycle and boundary.
    pub mean_flux: Vec<f64>,
}

/// Resolves a checkpoint file, or the newest checkpoint inside a directory.
pub fn resolve_checkpoint(path: &Path) -> Result<PathBuf, RareError> {
    if !path.is_dir() {
        return Ok(path.to_path_buf());
    }
    Checkpointer::new(path, 1).latest_path()?.ok_or_else(|| {
        RareError::Checkpoint(
            ErrorInfo::new("no-checkpoint", "directory holds no checkpoint files")
                .with_context("path", path.display().to_string()),
        )
    })
}

/// Summarizes a checkpoint without knowing its walker state type.
pub fn summarize(path: &Path) -> Result<CheckpointSummary, RareError> {
    let file = resolve_checkpoint(path)?;
    let payload: CheckpointPayload<Value> = CheckpointPayload::load(&file)?;
    Ok(CheckpointSummary {
        path: file,
        cycle: payload.cycle,
        master_seed: payload.master_seed,
        walkers: payload.population.len(),
        total_weight: payload.population.total_weight(),
        bins: payload.population.occupancy(),
        cumulative_flux: payload.flux.cumulative().to_vec(),
        mean_flux: payload.flux.mean_flux(),
    })
}

impl fmt::Display for CheckpointSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "checkpoint: {}", self.path.display())?;
        writeln!(f, "cycle: {}", self.cycle)?;
        writeln!(f, "walkers: {}", self.walkers)?;
        writeln!(f, "total weight: {:.15}", self.total_weight)?;
        writeln!(f, "bins:")?;
        for (bin, stats) in &self.bins {
            writeln!(
                f,
                "  {bin:>4}  walkers={:<4} weight={:.6e}",
                stats.walkers, stats.weight
            )?;
        }
        for (boundary, (total, mean)) in self
            .cumulative_flux
            .iter()
            .zip(&self.mean_flux)
            .enumerate()
        {
            writeln!(
                f,
                "boundary {boundary}: cumulative flux={total:.6e} mean flux={mean:.6e}"
            )?;
        }
        Ok(())
    }
}
