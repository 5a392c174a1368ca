use std::collections::BTreeMap;
use std::path::PathBuf;

use rare_core::errors::ErrorInfo;
use rare_core::{ProgressCoordinate, RareError, Snapshot};
use serde::{Deserialize, Serialize};

use crate::process::run_command;
use crate::template::render_args;

/// External analysis command computing the progress coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSpec {
    /// Program and arguments; `{state}`, `{trajectory}` and `{topology}` are expanded.
    pub command: Vec<String>,
    /// Topology file handed to the analysis tool.
    #[serde(default)]
    pub topology: Option<PathBuf>,
    /// Multiplier applied to every parsed value (unit conversion).
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

impl ProgressSpec {
    /// Creates a spec with unit scale and no topology.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            topology: None,
            scale: default_scale(),
        }
    }

    pub(crate) fn placeholders(
        &self,
        state: Option<&str>,
        trajectory: Option<&str>,
    ) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("state", state.unwrap_or_default().to_string());
        params.insert("trajectory", trajectory.unwrap_or_default().to_string());
        params.insert(
            "topology",
            self.topology
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        );
        params
    }
}

/// Returns the last token of `text` that parses as a float.
pub fn parse_last_value(text: &str) -> Option<f64> {
    text.split_whitespace()
        .rev()
        .find_map(|token| token.parse::<f64>().ok())
}

/// Parses one value per line, taking the last column; blank and `#` lines are skipped.
pub fn parse_series(text: &str) -> Result<Vec<f64>, RareError> {
    let mut values = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let value = trimmed
            .split_whitespace()
            .last()
            .and_then(|token| token.parse::<f64>().ok())
            .ok_or_else(|| {
                RareError::Progress(
                    ErrorInfo::new("series-parse", "analysis output line is not numeric")
                        .with_context("line", (line_no + 1).to_string())
                        .with_context("content", trimmed.to_string()),
                )
            })?;
        values.push(value);
    }
    Ok(values)
}

/// [`ProgressCoordinate`] computed by an external analysis command.
#[derive(Debug, Clone)]
pub struct CommandProgressCoordinate {
    spec: ProgressSpec,
}

impl CommandProgressCoordinate {
    /// Creates the coordinate from its analysis spec.
    pub fn new(spec: ProgressSpec) -> Self {
        Self { spec }
    }
}

impl ProgressCoordinate<Snapshot> for CommandProgressCoordinate {
    fn evaluate(&self, state: &Snapshot) -> Result<f64, RareError> {
        let state_arg = state.path().display().to_string();
        let params = self.spec.placeholders(Some(state_arg.as_str()), None);
        let argv = render_args(&self.spec.command, &params)?;
        let stdout = run_command(&argv, None, RareError::Progress)?;
        let value = parse_last_value(&stdout).ok_or_else(|| {
            RareError::Progress(
                ErrorInfo::new("progress-parse", "analysis output contained no number")
                    .with_context("state", state_arg.clone()),
            )
        })?;
        let scaled = value * self.spec.scale;
        if !scaled.is_finite() {
            return Err(RareError::Progress(
                ErrorInfo::new("progress-non-finite", "progress coordinate is not finite")
                    .with_context("state", state_arg),
            ));
        }
        Ok(scaled)
    }
}
