use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::{RareError, Snapshot, StepContext, Stepper};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::process::run_command;
use crate::template::render_args;

/// How to invoke the external MD engine for one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSpec {
    /// Program and arguments. `{start}`, `{final}` and `{trajectory}` expand to staged file names.
    pub command: Vec<String>,
    /// Constant input files copied into every scratch directory.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// File name the starting restart is staged under.
    #[serde(default = "default_start_name")]
    pub start_name: String,
    /// File name of the restart the engine writes.
    #[serde(default = "default_final_name")]
    pub final_name: String,
    /// File name of the trajectory the engine writes, when one is needed.
    #[serde(default)]
    pub trajectory_name: Option<String>,
    /// Root directory for scratch space and produced states.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    /// Keep scratch directories after a successful run.
    #[serde(default)]
    pub keep_scratch: bool,
}

fn default_start_name() -> String {
    "start.ncrst".into()
}

fn default_final_name() -> String {
    "final.ncrst".into()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("work")
}

impl EngineSpec {
    /// Creates a spec running `command` with default staging names.
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            inputs: Vec::new(),
            start_name: default_start_name(),
            final_name: default_final_name(),
            trajectory_name: None,
            work_dir: default_work_dir(),
            keep_scratch: false,
        }
    }

    fn placeholders(&self) -> BTreeMap<&'static str, String> {
        let mut params = BTreeMap::new();
        params.insert("start", self.start_name.clone());
        params.insert("final", self.final_name.clone());
        params.insert(
            "trajectory",
            self.trajectory_name.clone().unwrap_or_default(),
        );
        params
    }

    fn extension_of(name: &str) -> Option<&str> {
        Path::new(name).extension().and_then(|ext| ext.to_str())
    }

    /// Destination name for a produced file, keeping the engine's extension.
    pub(crate) fn stored_name(stem: &str, produced: &str) -> String {
        match Self::extension_of(produced) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem.to_string(),
        }
    }
}

fn io_error(
    family: fn(ErrorInfo) -> RareError,
    code: &str,
    path: &Path,
    err: impl ToString,
) -> RareError {
    family(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
}

/// Creates a clean scratch directory holding the constant inputs and the start state.
pub(crate) fn stage_scratch(
    spec: &EngineSpec,
    label: &str,
    start: &Snapshot,
) -> Result<PathBuf, RareError> {
    let scratch = spec.work_dir.join("scratch").join(label);
    if scratch.exists() {
        fs::remove_dir_all(&scratch)
            .map_err(|err| io_error(RareError::Step, "scratch-clean", &scratch, err))?;
    }
    fs::create_dir_all(&scratch)
        .map_err(|err| io_error(RareError::Step, "scratch-mkdir", &scratch, err))?;

    for input in &spec.inputs {
        let Some(name) = input.file_name() else {
            return Err(RareError::Config(
                ErrorInfo::new("engine-input", "engine input has no file name")
                    .with_context("path", input.display().to_string()),
            ));
        };
        fs::copy(input, scratch.join(name))
            .map_err(|err| io_error(RareError::Step, "stage-input", input, err))?;
    }
    fs::copy(start.path(), scratch.join(&spec.start_name))
        .map_err(|err| io_error(RareError::Step, "stage-start", start.path(), err))?;
    Ok(scratch)
}

/// Runs the engine inside a staged scratch directory.
pub(crate) fn run_engine(spec: &EngineSpec, scratch: &Path) -> Result<(), RareError> {
    let argv = render_args(&spec.command, &spec.placeholders())?;
    run_command(&argv, Some(scratch), RareError::Step)?;
    Ok(())
}

/// Moves a file the engine produced out of scratch, failing if it is missing.
pub(crate) fn collect_output(
    scratch: &Path,
    produced: &str,
    destination: &Path,
) -> Result<PathBuf, RareError> {
    let source = scratch.join(produced);
    if !source.is_file() {
        return Err(RareError::Step(
            ErrorInfo::new("engine-output-missing", "engine did not write an expected output")
                .with_context("file", produced.to_string())
                .with_context("scratch", scratch.display().to_string()),
        ));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| io_error(RareError::Step, "output-mkdir", parent, err))?;
    }
    if fs::rename(&source, destination).is_err() {
        fs::copy(&source, destination)
            .map_err(|err| io_error(RareError::Step, "output-copy", destination, err))?;
    }
    Ok(destination.to_path_buf())
}

pub(crate) fn finish_scratch(spec: &EngineSpec, scratch: &Path) {
    if !spec.keep_scratch {
        if let Err(err) = fs::remove_dir_all(scratch) {
            debug!(scratch = %scratch.display(), error = %err, "could not remove scratch directory");
        }
    }
}

/// [`Stepper`] running one MD segment per walker through an external command.
#[derive(Debug, Clone)]
pub struct CommandStepper {
    spec: EngineSpec,
}

impl CommandStepper {
    /// Creates a stepper from its engine spec.
    pub fn new(spec: EngineSpec) -> Self {
        Self { spec }
    }

    /// Returns the engine spec.
    pub fn spec(&self) -> &EngineSpec {
        &self.spec
    }
}

impl Stepper<Snapshot> for CommandStepper {
    fn advance(&self, state: &Snapshot, ctx: &StepContext) -> Result<Snapshot, RareError> {
        let label = format!("c{:05}_w{:06}", ctx.cycle, ctx.walker);
        let scratch = stage_scratch(&self.spec, &label, state)?;
        run_engine(&self.spec, &scratch).map_err(|err| with_walker(err, ctx))?;
        let destination = self
            .spec
            .work_dir
            .join("states")
            .join(EngineSpec::stored_name(&label, &self.spec.final_name));
        let stored = collect_output(&scratch, &self.spec.final_name, &destination)
            .map_err(|err| with_walker(err, ctx))?;
        finish_scratch(&self.spec, &scratch);
        debug!(cycle = ctx.cycle, walker = ctx.walker, state = %stored.display(), "walker advanced");
        Ok(Snapshot::new(stored))
    }
}

fn with_walker(err: RareError, ctx: &StepContext) -> RareError {
    err.with_context("cycle", ctx.cycle.to_string())
        .with_context("walker", ctx.walker.to_string())
}
