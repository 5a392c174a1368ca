//! `rare inspect`: checkpoint summaries.

use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use rare_we::summarize;

/// Arguments of the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Checkpoint file, or a checkpoint directory whose latest file is read.
    pub path: PathBuf,
    /// Emit the summary as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Renders the summary the subcommand prints.
pub fn render(args: &InspectArgs) -> Result<String, Box<dyn Error>> {
    let summary = summarize(&args.path)?;
    if args.json {
        Ok(serde_json::to_string_pretty(&summary)?)
    } else {
        Ok(summary.to_string())
    }
}

/// Executes the `inspect` subcommand.
pub fn run(args: &InspectArgs) -> Result<(), Box<dyn Error>> {
    let rendered = render(args)?;
    println!("{}", rendered.trim_end());
    Ok(())
}
