use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rare_core::errors::ErrorInfo;
use rare_core::{RareError, RunProvenance};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::RunConfig;

/// Structured manifest describing a completed weighted-ensemble run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Config hash, seed and its label, creation time and tool versions.
    pub provenance: RunProvenance,
    /// Cycles completed, including restored ones.
    pub cycles_completed: usize,
    /// Walkers in the final population.
    pub final_walkers: usize,
    /// Cumulative flux per boundary.
    pub cumulative_flux: Vec<f64>,
    /// Mean flux per cycle and boundary.
    pub mean_flux: Vec<f64>,
    /// Cycle log relative to the run directory.
    pub cycle_log: Option<PathBuf>,
    /// Checkpoints still on disk, relative to the run directory.
    pub checkpoints: Vec<PathBuf>,
}

/// SHA-256 of the canonical JSON form of `config`, hex encoded.
pub fn config_hash(config: &RunConfig) -> Result<String, RareError> {
    let bytes = serde_json::to_vec(config)
        .map_err(|err| RareError::Serde(ErrorInfo::new("config-serialize", err.to_string())))?;
    Ok(hex::encode(Sha256::digest(bytes)))
}

/// Provenance record for a run started now.
pub fn provenance(config: &RunConfig) -> Result<RunProvenance, RareError> {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert("rare-we".to_string(), env!("CARGO_PKG_VERSION").to_string());
    Ok(RunProvenance {
        config_hash: config_hash(config)?,
        seed: config.seed_policy.master_seed,
        seed_label: config.seed_policy.label.clone(),
        created_at: Utc::now().to_rfc3339(),
        tool_versions,
    })
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), RareError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                RareError::Serde(
                    ErrorInfo::new("manifest-mkdir", err.to_string())
                        .with_context("path", parent.display().to_string()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("manifest-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("manifest-write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, RareError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("manifest-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("manifest-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}
