#![deny(missing_docs)]

//! Sequential umbrella sampling by adaptive restraint walking.
//!
//! Windows run one after another, each restrained around a center placed one
//! scaled standard deviation beyond the previous one, until the center
//! reaches `r_max`. Every window leaves a trajectory, a restart, a distance
//! file and a line in the WHAM metadata file.

/// YAML schedule configuration.
pub mod config;
/// The window loop.
pub mod driver;
/// Persisted record of completed windows.
pub mod ledger;
/// Restraint file rendering.
pub mod restraint;

pub use config::UmbrellaConfig;
pub use driver::{mean_and_std, run_schedule, UmbrellaSummary};
pub use ledger::{WindowLedger, WindowRecord};
pub use restraint::RestraintTemplate;
