#![deny(missing_docs)]

//! Command-line front end for the rare-event samplers.
//!
//! The `rare` binary wires the subprocess adapters from `rare-engine` into
//! the weighted-ensemble loop and the umbrella schedule, and can summarise
//! checkpoints left behind by earlier runs.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Subcommand implementations.
pub mod commands;
/// Subscriber installation for the binary.
pub mod logging;

use commands::{inspect::InspectArgs, umbrella::UmbrellaArgs, we::WeArgs};

/// Top-level command line.
#[derive(Parser, Debug)]
#[command(name = "rare", about = "Rare-event sampling driver", version)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Silence all log output on stderr.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
    /// Also write logs to this file.
    #[arg(long, value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
    /// Size of the worker pool used for stepping and evaluation.
    #[arg(long, value_name = "N", global = true)]
    pub threads: Option<usize>,
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a weighted-ensemble simulation.
    We(WeArgs),
    /// Run sequential umbrella sampling windows.
    Umbrella(UmbrellaArgs),
    /// Summarise a checkpoint or the latest checkpoint in a directory.
    Inspect(InspectArgs),
}
