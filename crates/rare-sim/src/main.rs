use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use rare_sim::{commands, logging, Cli};
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("error: failed to initialise logging: {err}");
        return ExitCode::FAILURE;
    }
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: &Cli) -> Result<(), Box<dyn Error>> {
    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }
    commands::dispatch(&cli.command)
}
