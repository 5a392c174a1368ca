use std::fs;
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::{RareError, SchemaVersion};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::recycler::FluxLedger;
use crate::walker::Population;

/// Schema written into every checkpoint.
pub const CHECKPOINT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Total-weight tolerance applied when a checkpoint is restored.
pub const RESTART_TOLERANCE: f64 = 1e-6;

/// Everything needed to continue a run after `cycle` completed cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload<S> {
    /// Schema of the payload.
    pub schema: SchemaVersion,
    /// Number of cycles completed when the checkpoint was written.
    pub cycle: usize,
    /// Master seed of the run.
    pub master_seed: u64,
    /// Walker population after resampling.
    pub population: Population<S>,
    /// Flux accumulated so far.
    pub flux: FluxLedger,
}

impl<S> CheckpointPayload<S> {
    /// Assembles a payload with the current schema.
    pub fn new(cycle: usize, master_seed: u64, population: Population<S>, flux: FluxLedger) -> Self {
        Self {
            schema: CHECKPOINT_SCHEMA,
            cycle,
            master_seed,
            population,
            flux,
        }
    }

    /// Rejects payloads that cannot seed a restart.
    pub fn validate(&self) -> Result<(), RareError> {
        if !CHECKPOINT_SCHEMA.reads(&self.schema) {
            return Err(RareError::Checkpoint(
                ErrorInfo::new("schema-mismatch", "checkpoint schema is not supported")
                    .with_context("found", self.schema.to_string())
                    .with_context("supported", CHECKPOINT_SCHEMA.to_string()),
            ));
        }
        self.population
            .validate_normalised(RESTART_TOLERANCE)
            .and_then(|()| self.population.check_ids())
            .map_err(|err| {
                let info = err.info().clone();
                RareError::Checkpoint(info.with_context("cycle", self.cycle.to_string()))
            })
    }
}

impl<S: DeserializeOwned> CheckpointPayload<S> {
    /// Restores a payload from disk.
    pub fn load(path: &Path) -> Result<Self, RareError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RareError::Checkpoint(
                ErrorInfo::new("checkpoint-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            RareError::Checkpoint(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

impl<S: Serialize> CheckpointPayload<S> {
    /// Writes the payload next to `path` and renames it into place.
    pub fn store(&self, path: &Path) -> Result<(), RareError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RareError::Serde(
                    ErrorInfo::new("checkpoint-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("checkpoint-write", err.to_string())
                    .with_context("path", staging.display().to_string()),
            )
        })?;
        fs::rename(&staging, path).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("checkpoint-rename", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Deterministic checkpoint file path for `cycle` completed cycles.
pub fn checkpoint_path(root: &Path, cycle: usize) -> PathBuf {
    root.join(format!("ckpt_{cycle:05}.json"))
}

fn checkpoint_cycle(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    name.strip_prefix("ckpt_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

/// Writes checkpoints into one directory and prunes old ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpointer {
    directory: PathBuf,
    max_to_keep: usize,
}

impl Checkpointer {
    /// Checkpointer keeping the newest `max_to_keep` files (at least one).
    pub fn new(directory: impl Into<PathBuf>, max_to_keep: usize) -> Self {
        Self {
            directory: directory.into(),
            max_to_keep: max_to_keep.max(1),
        }
    }

    /// Directory holding the checkpoints.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Stores the payload and applies retention; returns the new file.
    pub fn save<S: Serialize>(&self, payload: &CheckpointPayload<S>) -> Result<PathBuf, RareError> {
        let path = checkpoint_path(&self.directory, payload.cycle);
        payload.store(&path)?;
        debug!(path = %path.display(), cycle = payload.cycle, "checkpoint written");
        self.enforce_retention()?;
        Ok(path)
    }

    /// Checkpoint files ordered by cycle, oldest first. A missing directory is empty.
    pub fn list(&self) -> Result<Vec<PathBuf>, RareError> {
        if !self.directory.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.directory).map_err(|err| {
            RareError::Checkpoint(
                ErrorInfo::new("checkpoint-list", err.to_string())
                    .with_context("path", self.directory.display().to_string()),
            )
        })?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                RareError::Checkpoint(
                    ErrorInfo::new("checkpoint-list", err.to_string())
                        .with_context("path", self.directory.display().to_string()),
                )
            })?;
            let path = entry.path();
            if let Some(cycle) = checkpoint_cycle(&path) {
                found.push((cycle, path));
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, path)| path).collect())
    }

    /// Newest checkpoint, if any.
    pub fn latest_path(&self) -> Result<Option<PathBuf>, RareError> {
        Ok(self.list()?.pop())
    }

    /// Loads and validates the newest checkpoint.
    pub fn load_latest<S: DeserializeOwned>(
        &self,
    ) -> Result<Option<(PathBuf, CheckpointPayload<S>)>, RareError> {
        let Some(path) = self.latest_path()? else {
            return Ok(None);
        };
        let payload = CheckpointPayload::load(&path)?;
        payload.validate()?;
        Ok(Some((path, payload)))
    }

    fn enforce_retention(&self) -> Result<(), RareError> {
        let mut paths = self.list()?;
        while paths.len() > self.max_to_keep {
            let oldest = paths.remove(0);
            fs::remove_file(&oldest).map_err(|err| {
                RareError::Serde(
                    ErrorInfo::new("checkpoint-remove", err.to_string())
                        .with_context("path", oldest.display().to_string()),
                )
            })?;
        }
        Ok(())
    }
}
