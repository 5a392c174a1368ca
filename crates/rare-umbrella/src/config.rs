use std::fs;
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::RareError;
use serde::{Deserialize, Serialize};

/// Parameters of a sequential umbrella sampling schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmbrellaConfig {
    /// Restraint center of the first window.
    pub r_min: f64,
    /// The schedule stops once the next center reaches this value.
    pub r_max: f64,
    /// Scale applied to the sampled standard deviation to place the next window.
    pub r_fac: f64,
    /// Force constant written into the restraint file.
    pub r_k: f64,
    /// Restraint file template with `{r1}`, `{r2}`, `{r4}` and `{r_k}` placeholders.
    pub restraint_template: PathBuf,
    /// WHAM metadata file, appended to.
    pub metadata: PathBuf,
    /// Directory receiving per-window trajectories, restarts and distance files.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Leading frames of every window left out of the distance file.
    #[serde(default = "default_equilibration_frames")]
    pub equilibration_frames: usize,
    /// Half width of the flat-bottom region around the center.
    #[serde(default = "default_flank")]
    pub flank: f64,
    /// Lower clamp of the inner restraint bound.
    #[serde(default = "default_lower_limit")]
    pub lower_limit: f64,
    /// Upper bound on the number of windows run by one invocation.
    #[serde(default)]
    pub max_windows: Option<usize>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_equilibration_frames() -> usize {
    10
}

fn default_flank() -> f64 {
    6.0
}

fn default_lower_limit() -> f64 {
    1.0
}

impl UmbrellaConfig {
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
        Self::from_yaml_str(&contents)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Rejects schedules that cannot advance.
    pub fn validate(&self) -> Result<(), RareError> {
        for (field, value) in [
            ("r_min", self.r_min),
            ("r_max", self.r_max),
            ("r_fac", self.r_fac),
            ("r_k", self.r_k),
            ("flank", self.flank),
            ("lower_limit", self.lower_limit),
        ] {
            if !value.is_finite() {
                return Err(RareError::Config(
                    ErrorInfo::new("non-finite", format!("{field} must be finite"))
                        .with_context("field", field),
                ));
            }
        }
        if self.r_fac <= 0.0 {
            return Err(RareError::Config(
                ErrorInfo::new("non-positive-r-fac", "r_fac must be positive")
                    .with_context("r_fac", self.r_fac.to_string()),
            ));
        }
        if self.r_min > self.r_max {
            return Err(RareError::Config(
                ErrorInfo::new("inverted-range", "r_min must not exceed r_max")
                    .with_context("r_min", self.r_min.to_string())
                    .with_context("r_max", self.r_max.to_string()),
            ));
        }
        if self.max_windows == Some(0) {
            return Err(RareError::Config(ErrorInfo::new(
                "zero-windows",
                "max_windows must be at least one when set",
            )));
        }
        Ok(())
    }
}
