use std::error::Error;

use crate::Command;

/// Checkpoint inspection.
pub mod inspect;
/// Sequential umbrella sampling.
pub mod umbrella;
/// Weighted-ensemble runs.
pub mod we;

/// Runs the selected subcommand.
pub fn dispatch(command: &Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::We(args) => we::run(args),
        Command::Umbrella(args) => umbrella::run(args),
        Command::Inspect(args) => inspect::run(args),
    }
}
