use std::fs;
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use serde::{Deserialize, Serialize};

use crate::recycler::{Boundary, Direction};

/// YAML-configurable parameters governing a weighted-ensemble run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target number of walkers per occupied bin; also the initial population size.
    pub n_reps: usize,
    /// Total number of cycles, counting those restored from a checkpoint.
    pub n_cycles: usize,
    /// Ordered bin edges along the progress coordinate.
    pub edges: Vec<f64>,
    /// Single-boundary shorthand: recycling target.
    #[serde(default)]
    pub target_pc: Option<f64>,
    /// Direction of the `target_pc` boundary.
    #[serde(default)]
    pub retrograde: bool,
    /// Additional absorbing boundaries, evaluated after `target_pc`.
    #[serde(default)]
    pub boundaries: Vec<Boundary>,
    /// Interval in cycles between checkpoint writes.
    #[serde(default = "default_check_freq")]
    pub check_freq: usize,
    /// Resume from the latest checkpoint in the run directory.
    #[serde(default)]
    pub restart: bool,
    /// Walkers are never split into halves lighter than this.
    #[serde(default = "default_min_weight")]
    pub min_weight: f64,
    /// Checkpoint retention.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_check_freq() -> usize {
    1
}

fn default_min_weight() -> f64 {
    1e-12
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_reps: 4,
            n_cycles: 10,
            edges: vec![0.0, 1.0],
            target_pc: None,
            retrograde: false,
            boundaries: Vec::new(),
            check_freq: default_check_freq(),
            restart: false,
            min_weight: default_min_weight(),
            checkpoint: CheckpointConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML document and validates it.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, RareError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|err| {
            RareError::Config(ErrorInfo::new("config-parse", err.to_string()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML file.
    pub fn load(path: &Path) -> Result<Self, RareError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RareError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| match err {
            RareError::Config(info) => {
                RareError::Config(info.with_context("path", path.display().to_string()))
            }
            other => other,
        })
    }

    /// Rejects values the controller cannot run with.
    pub fn validate(&self) -> Result<(), RareError> {
        for (field, value) in [
            ("n_reps", self.n_reps),
            ("n_cycles", self.n_cycles),
            ("check_freq", self.check_freq),
        ] {
            if value == 0 {
                return Err(RareError::Config(
                    ErrorInfo::new("zero-count", format!("{field} must be at least one"))
                        .with_context("field", field),
                ));
            }
        }
        if self.edges.len() < 2 {
            return Err(RareError::Config(
                ErrorInfo::new("too-few-edges", "at least two bin edges are required")
                    .with_context("edges", self.edges.len().to_string()),
            ));
        }
        if self.edges.iter().any(|edge| !edge.is_finite())
            || self.edges.windows(2).any(|pair| pair[0] >= pair[1])
        {
            return Err(RareError::Config(
                ErrorInfo::new("invalid-edges", "bin edges must be finite and strictly increasing")
                    .with_hint("list edges in ascending order without duplicates"),
            ));
        }
        if self
            .resolved_boundaries()
            .iter()
            .any(|boundary| !boundary.target.is_finite())
        {
            return Err(RareError::Config(ErrorInfo::new(
                "non-finite-target",
                "recycling targets must be finite",
            )));
        }
        if !self.min_weight.is_finite() || self.min_weight < 0.0 {
            return Err(RareError::Config(
                ErrorInfo::new("invalid-min-weight", "min_weight must be finite and >= 0")
                    .with_context("min_weight", self.min_weight.to_string()),
            ));
        }
        if self.checkpoint.max_to_keep == 0 {
            return Err(RareError::Config(ErrorInfo::new(
                "zero-retention",
                "checkpoint.max_to_keep must be at least one",
            )));
        }
        Ok(())
    }

    /// All absorbing boundaries: the `target_pc` shorthand first, then `boundaries`.
    pub fn resolved_boundaries(&self) -> Vec<Boundary> {
        let mut resolved = Vec::with_capacity(self.boundaries.len() + 1);
        if let Some(target) = self.target_pc {
            resolved.push(Boundary {
                target,
                direction: if self.retrograde {
                    Direction::Retrograde
                } else {
                    Direction::Forward
                },
            });
        }
        resolved.extend(self.boundaries.iter().copied());
        resolved
    }
}

/// Checkpoint retention settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Maximum number of checkpoints kept on disk.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed the per-cycle resampling streams derive from.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in the manifest.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout.
///
/// Without a `run_directory` the run writes no files at all: no logs,
/// checkpoints or manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Created if it does not exist.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Cycle log filename relative to `run_directory`.
    #[serde(default = "default_cycle_log")]
    pub cycle_log: PathBuf,
    /// Per-walker progress log filename relative to `run_directory`.
    #[serde(default = "default_progress_log")]
    pub progress_log: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

fn default_cycle_log() -> PathBuf {
    PathBuf::from("cycles.csv")
}

fn default_progress_log() -> PathBuf {
    PathBuf::from("progress.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            cycle_log: default_cycle_log(),
            progress_log: default_progress_log(),
            manifest_file: default_manifest_filename(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}

impl OutputConfig {
    /// Absolute checkpoint directory, when a run directory is configured.
    pub fn checkpoint_directory(&self) -> Option<PathBuf> {
        self.run_directory
            .as_ref()
            .map(|root| root.join(&self.checkpoint_dir))
    }

    /// Absolute cycle log path, when a run directory is configured.
    pub fn cycle_log_path(&self) -> Option<PathBuf> {
        self.run_directory
            .as_ref()
            .map(|root| root.join(&self.cycle_log))
    }

    /// Absolute progress log path, when a run directory is configured.
    pub fn progress_log_path(&self) -> Option<PathBuf> {
        self.run_directory
            .as_ref()
            .map(|root| root.join(&self.progress_log))
    }

    /// Absolute manifest path, when a run directory is configured.
    pub fn manifest_path(&self) -> Option<PathBuf> {
        self.run_directory
            .as_ref()
            .map(|root| root.join(&self.manifest_file))
    }
}
