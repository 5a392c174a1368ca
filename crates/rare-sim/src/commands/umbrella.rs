//! `rare umbrella`: sequential umbrella sampling.

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use rare_core::errors::ErrorInfo;
use rare_core::{RareError, Snapshot};
use rare_engine::{CommandWindowSampler, WindowSpec};
use rare_umbrella::{run_schedule, UmbrellaConfig};
use serde::{Deserialize, Serialize};

/// Arguments of the `umbrella` subcommand.
#[derive(Args, Debug)]
pub struct UmbrellaArgs {
    /// YAML file with the schedule, the start structure and the window commands.
    #[arg(long)]
    pub config: PathBuf,
}

/// On-disk layout of an `umbrella` configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UmbrellaFile {
    /// Window schedule.
    #[serde(flatten)]
    pub schedule: UmbrellaConfig,
    /// Restart the first window starts from.
    pub start: PathBuf,
    /// Engine and analysis invocations for one window.
    pub window: WindowSpec,
}

impl UmbrellaFile {
    /// Reads and parses a configuration file.
    pub fn load(path: &Path) -> Result<Self, RareError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            RareError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_yaml::from_str(&contents).map_err(|err| {
            RareError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }
}

/// Executes the `umbrella` subcommand.
pub fn run(args: &UmbrellaArgs) -> Result<(), Box<dyn Error>> {
    let file = UmbrellaFile::load(&args.config)?;
    let sampler = CommandWindowSampler::new(file.window.clone())?;
    let summary = run_schedule(&file.schedule, Snapshot::new(file.start.clone()), &sampler)?;

    for window in &summary.windows {
        println!(
            "window {:>3}  center={:.3}  mean={:.3}  std={:.3}  frames={}",
            window.index, window.center, window.mean, window.std, window.frames
        );
    }
    if summary.reached_r_max {
        println!("r_max reached; next center would be {:.3}", summary.next_center);
    } else {
        println!("stopped before r_max; next center {:.3}", summary.next_center);
    }
    Ok(())
}
