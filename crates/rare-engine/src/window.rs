use std::fs;

use rare_core::errors::ErrorInfo;
use rare_core::{RareError, Restraint, Snapshot, WindowOutput, WindowSampler};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{collect_output, finish_scratch, run_engine, stage_scratch, EngineSpec};
use crate::process::run_command;
use crate::progress::{parse_series, ProgressSpec};
use crate::template::render_args;

/// Engine and analysis commands for restrained umbrella windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSpec {
    /// Engine invocation; `trajectory_name` must be set.
    pub engine: EngineSpec,
    /// File name the rendered restraint is staged under.
    #[serde(default = "default_restraint_name")]
    pub restraint_name: String,
    /// Trajectory analysis printing one coordinate value per frame.
    pub analysis: ProgressSpec,
}

fn default_restraint_name() -> String {
    "disang.dat".into()
}

/// [`WindowSampler`] backed by the external MD engine.
#[derive(Debug, Clone)]
pub struct CommandWindowSampler {
    spec: WindowSpec,
}

impl CommandWindowSampler {
    /// Validates the spec and creates the sampler.
    pub fn new(spec: WindowSpec) -> Result<Self, RareError> {
        if spec.engine.trajectory_name.is_none() {
            return Err(RareError::Config(
                ErrorInfo::new("window-trajectory", "umbrella windows need a trajectory file")
                    .with_hint("set engine.trajectory_name, e.g. md.nc"),
            ));
        }
        Ok(Self { spec })
    }
}

impl WindowSampler for CommandWindowSampler {
    fn sample_window(
        &self,
        start: &Snapshot,
        restraint: &Restraint,
        window: usize,
    ) -> Result<WindowOutput, RareError> {
        let engine = &self.spec.engine;
        let label = format!("w{window:03}");
        let scratch = stage_scratch(engine, &label, start)?;
        let restraint_path = scratch.join(&self.spec.restraint_name);
        fs::write(&restraint_path, &restraint.contents).map_err(|err| {
            RareError::Step(
                ErrorInfo::new("stage-restraint", err.to_string())
                    .with_context("path", restraint_path.display().to_string()),
            )
        })?;

        run_engine(engine, &scratch)?;

        // trajectory_name presence is checked in `new`
        let trajectory_name = engine.trajectory_name.clone().unwrap_or_default();
        let params = self
            .spec
            .analysis
            .placeholders(Some(engine.final_name.as_str()), Some(trajectory_name.as_str()));
        let argv = render_args(&self.spec.analysis.command, &params)?;
        let stdout = run_command(&argv, Some(&scratch), RareError::Progress)?;
        let samples: Vec<f64> = parse_series(&stdout)?
            .into_iter()
            .map(|value| value * self.spec.analysis.scale)
            .collect();
        if samples.is_empty() {
            return Err(RareError::Progress(
                ErrorInfo::new("window-no-frames", "trajectory analysis produced no frames")
                    .with_context("window", window.to_string()),
            ));
        }

        let store = engine.work_dir.join("windows");
        let final_state = collect_output(
            &scratch,
            &engine.final_name,
            &store.join(EngineSpec::stored_name(&label, &engine.final_name)),
        )?;
        let trajectory = collect_output(
            &scratch,
            &trajectory_name,
            &store.join(EngineSpec::stored_name(&label, &trajectory_name)),
        )?;
        finish_scratch(engine, &scratch);
        debug!(window, frames = samples.len(), "umbrella window sampled");

        Ok(WindowOutput {
            final_state: Snapshot::new(final_state),
            trajectory: Some(trajectory),
            samples,
        })
    }
}
