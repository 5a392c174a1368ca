//! `rare we`: weighted-ensemble runs driven by external commands.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use rare_core::errors::ErrorInfo;
use rare_core::{RareError, Snapshot};
use rare_engine::{CommandProgressCoordinate, CommandStepper, EngineSpec, ProgressSpec};
use rare_we::RunConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Arguments of the `we` subcommand.
#[derive(Args, Debug)]
pub struct WeArgs {
    /// YAML file with the run configuration and the engine and progress commands.
    #[arg(long)]
    pub config: PathBuf,
    /// Restore the latest checkpoint in the run directory before stepping.
    #[arg(long)]
    pub restart: bool,
    /// Run directory for checkpoints, the cycle log and the manifest.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Continue from this checkpoint file instead of the configured seed state.
    #[arg(long, value_name = "PATH", conflicts_with = "restart")]
    pub from_checkpoint: Option<PathBuf>,
}

/// On-disk layout of a `we` configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeFile {
    /// Population control settings.
    #[serde(flatten)]
    pub run: RunConfig,
    /// Restart file every fresh walker and every recycled walker starts from.
    pub seed_state: PathBuf,
    /// MD engine invocation.
    pub engine: EngineSpec,
    /// Progress coordinate analysis invocation.
    pub progress: ProgressSpec,
}

impl WeFile {
    /// Parses a configuration document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, RareError> {
        serde_yaml::from_str(contents)
            .map_err(|err| RareError::Config(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Reads and parses a configuration file.
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
}

/// Loads the configuration named by `args` and applies the command-line overrides.
pub fn resolve(args: &WeArgs) -> Result<WeFile, RareError> {
    let mut file = WeFile::load(&args.config)?;
    if args.restart {
        file.run.restart = true;
    }
    if let Some(out) = &args.out {
        file.run.output.run_directory = Some(out.clone());
    }
    file.run.validate()?;
    Ok(file)
}

/// Executes the `we` subcommand.
pub fn run(args: &WeArgs) -> Result<(), Box<dyn Error>> {
    let file = resolve(args)?;
    let seed_state = Snapshot::new(file.seed_state.clone());
    if !seed_state.exists() {
        return Err(Box::new(RareError::Config(
            ErrorInfo::new("missing-seed-state", "seed state file does not exist")
                .with_context("path", file.seed_state.display().to_string()),
        )));
    }
    let stepper = CommandStepper::new(file.engine.clone());
    let progress = CommandProgressCoordinate::new(file.progress.clone());

    let summary = match &args.from_checkpoint {
        Some(checkpoint) => {
            rare_we::resume(&file.run, checkpoint, seed_state, &stepper, &progress)?
        }
        None => rare_we::run(&file.run, seed_state, &stepper, &progress)?,
    };

    info!(
        start_cycle = summary.start_cycle,
        cycles = summary.cycles_completed,
        walkers = summary.population.len(),
        "weighted-ensemble run finished"
    );
    println!(
        "cycles completed: {} (started at {})",
        summary.cycles_completed, summary.start_cycle
    );
    println!("final walkers: {}", summary.population.len());
    for (boundary, (total, mean)) in summary
        .flux
        .cumulative()
        .iter()
        .zip(summary.flux.mean_flux())
        .enumerate()
    {
        println!("boundary {boundary}: cumulative flux={total:.6e} mean flux={mean:.6e}");
    }
    if let Some(manifest) = &summary.manifest_path {
        println!("manifest: {}", manifest.display());
    }
    Ok(())
}
