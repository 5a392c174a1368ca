#![deny(missing_docs)]
#![doc = "Adapters that run an external MD engine and analysis tools as subprocesses."]

/// Per-walker MD stepping through a staged scratch directory.
pub mod engine;
/// Subprocess invocation and failure reporting.
pub mod process;
/// Progress coordinates computed by external analysis commands.
pub mod progress;
/// Placeholder substitution for command lines and restraint templates.
pub mod template;
/// Restrained umbrella windows run through the engine.
pub mod window;

pub use engine::{CommandStepper, EngineSpec};
pub use progress::{parse_last_value, parse_series, CommandProgressCoordinate, ProgressSpec};
pub use template::{format_float, render};
pub use window::{CommandWindowSampler, WindowSpec};
