use std::fs;
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use serde::{Deserialize, Serialize};

/// File name of the ledger inside the output directory.
pub const LEDGER_FILE: &str = "windows.json";

/// One completed umbrella window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowRecord {
    /// One-based window number, continuing existing metadata.
    pub index: usize,
    /// Restraint center.
    pub center: f64,
    /// Force constant used for the restraint.
    pub force_constant: f64,
    /// Mean of the coordinate over all frames.
    pub mean: f64,
    /// Population standard deviation over all frames.
    pub std: f64,
    /// Frames sampled.
    pub frames: usize,
    /// Distance file listed in the metadata.
    pub dist_file: PathBuf,
    /// Copied trajectory, when the engine wrote one.
    pub trajectory: Option<PathBuf>,
    /// Copied final restart; the next window starts from it.
    pub restart: PathBuf,
}

/// Completed windows, persisted after every window so a schedule can resume.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WindowLedger {
    /// Windows in completion order.
    pub windows: Vec<WindowRecord>,
}

impl WindowLedger {
    /// Ledger path for an output directory.
    pub fn path_in(output_dir: &Path) -> PathBuf {
        output_dir.join(LEDGER_FILE)
    }

    /// Loads the ledger, or an empty one when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, RareError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("ledger-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("ledger-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Writes the ledger through a temporary file.
    pub fn store(&self, path: &Path) -> Result<(), RareError> {
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            RareError::Serde(
                ErrorInfo::new("ledger-serialize", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json)
            .and_then(|_| fs::rename(&staging, path))
            .map_err(|err| {
                RareError::Serde(
                    ErrorInfo::new("ledger-write", err.to_string())
                        .with_context("path", path.display().to_string()),
                )
            })
    }

    /// Most recent window.
    pub fn last(&self) -> Option<&WindowRecord> {
        self.windows.last()
    }
}
