use std::fmt;
use std::path::{Path, PathBuf};

use rare_core::errors::ErrorInfo;
use rare_core::{ProgressCoordinate, RareError, StepContext, Stepper};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::binner::Binner;
use crate::checkpoint::{CheckpointPayload, Checkpointer};
use crate::config::RunConfig;
use crate::determinism;
use crate::manifest::{self, RunManifest};
use crate::metrics::{CycleLog, CycleRecord, ProgressLog};
use crate::recycler::{Direction, FluxLedger, Recycler};
use crate::splitmerge::SplitMerger;
use crate::walker::{Population, WalkerState};

/// Drift allowed between the total weight at the start and end of a cycle.
const CONSERVATION_TOLERANCE: f64 = 1e-9;

/// Stage of the cycle loop, attached to errors raised inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Building or restoring the population.
    Init,
    /// Advancing every walker through the stepper.
    Stepping,
    /// Evaluating progress coordinates.
    Evaluating,
    /// Assigning bins.
    Binning,
    /// Recycling walkers past a boundary.
    Recycling,
    /// Splitting and merging.
    Resampling,
    /// Writing the cycle log.
    Logging,
    /// Writing a checkpoint.
    Checkpointing,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Stepping => "stepping",
            Phase::Evaluating => "evaluating",
            Phase::Binning => "binning",
            Phase::Recycling => "recycling",
            Phase::Resampling => "resampling",
            Phase::Logging => "logging",
            Phase::Checkpointing => "checkpointing",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary returned to callers after a run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary<S> {
    /// Cycle the run started from (non-zero after a restart).
    pub start_cycle: usize,
    /// Total cycles completed, including restored ones.
    pub cycles_completed: usize,
    /// Final population.
    pub population: Population<S>,
    /// Flux accumulated over the whole run, restored cycles included.
    pub flux: FluxLedger,
    /// Records of the cycles executed by this invocation.
    pub records: Vec<CycleRecord>,
    /// Cycle log, when a run directory is configured.
    pub cycle_log: Option<PathBuf>,
    /// Per-walker progress log, when a run directory is configured.
    pub progress_log: Option<PathBuf>,
    /// Manifest path, when a run directory is configured.
    pub manifest_path: Option<PathBuf>,
    /// Checkpoint files on disk at the end of the run.
    pub checkpoints: Vec<PathBuf>,
}

/// Runs the weighted-ensemble loop.
///
/// A fresh run starts `n_reps` walkers of weight `1 / n_reps` at
/// `seed_state`; with `config.restart` set the latest checkpoint in the run
/// directory is restored instead and validated before any stepping.
pub fn run<S, T, P>(
    config: &RunConfig,
    seed_state: S,
    stepper: &T,
    progress: &P,
) -> Result<RunSummary<S>, RareError>
where
    S: WalkerState,
    T: Stepper<S> + ?Sized,
    P: ProgressCoordinate<S> + ?Sized,
{
    config.validate()?;
    if config.restart {
        let Some(directory) = config.output.checkpoint_directory() else {
            return Err(RareError::Config(
                ErrorInfo::new("restart-without-output", "restart needs a run directory")
                    .with_hint("set output.run_directory"),
            ));
        };
        let checkpointer = Checkpointer::new(&directory, config.checkpoint.max_to_keep);
        let Some((path, payload)) = checkpointer.load_latest::<S>()? else {
            return Err(RareError::Checkpoint(
                ErrorInfo::new("no-checkpoint", "restart requested but no checkpoint exists")
                    .with_context("directory", directory.display().to_string()),
            ));
        };
        info!(checkpoint = %path.display(), cycle = payload.cycle, "restarting from checkpoint");
        return continue_from(config, seed_state, payload, stepper, progress);
    }

    let recycler = Recycler::new(seed_state.clone(), config.resolved_boundaries())?;
    let seed_progress = progress
        .evaluate(&seed_state)
        .map_err(|err| err.with_context("phase", Phase::Init.as_str()))?;
    if let Some(boundary) = recycler.crossed_boundary(seed_progress) {
        warn!(
            boundary,
            progress = seed_progress,
            "seed state already lies past a boundary, every walker will be recycled"
        );
    }
    let population = Population::uniform(seed_state, config.n_reps);
    let flux = FluxLedger::new(recycler.boundaries().len());
    info!(
        walkers = population.len(),
        cycles = config.n_cycles,
        boundaries = recycler.boundaries().len(),
        seed_progress,
        "starting weighted-ensemble run"
    );
    run_cycles(
        config,
        recycler,
        population,
        flux,
        0,
        Some(seed_progress),
        config.seed_policy.master_seed,
        stepper,
        progress,
    )
}

/// Resumes from an explicit checkpoint file.
pub fn resume<S, T, P>(
    config: &RunConfig,
    checkpoint: &Path,
    seed_state: S,
    stepper: &T,
    progress: &P,
) -> Result<RunSummary<S>, RareError>
where
    S: WalkerState,
    T: Stepper<S> + ?Sized,
    P: ProgressCoordinate<S> + ?Sized,
{
    config.validate()?;
    let payload = CheckpointPayload::<S>::load(checkpoint)?;
    payload
        .validate()
        .map_err(|err| err.with_context("path", checkpoint.display().to_string()))?;
    continue_from(config, seed_state, payload, stepper, progress)
}

fn continue_from<S, T, P>(
    config: &RunConfig,
    seed_state: S,
    payload: CheckpointPayload<S>,
    stepper: &T,
    progress: &P,
) -> Result<RunSummary<S>, RareError>
where
    S: WalkerState,
    T: Stepper<S> + ?Sized,
    P: ProgressCoordinate<S> + ?Sized,
{
    let recycler = Recycler::new(seed_state, config.resolved_boundaries())?;
    if payload.flux.cumulative().len() != recycler.boundaries().len() {
        return Err(RareError::Checkpoint(
            ErrorInfo::new("boundary-mismatch", "checkpoint flux does not match the boundaries")
                .with_context("checkpoint", payload.flux.cumulative().len().to_string())
                .with_context("config", recycler.boundaries().len().to_string()),
        ));
    }
    if payload.master_seed != config.seed_policy.master_seed {
        warn!(
            checkpoint = payload.master_seed,
            config = config.seed_policy.master_seed,
            "master seed differs from the configuration, keeping the checkpoint seed"
        );
    }
    run_cycles(
        config,
        recycler,
        payload.population,
        payload.flux,
        payload.cycle,
        None,
        payload.master_seed,
        stepper,
        progress,
    )
}

#[allow(clippy::too_many_arguments)]
fn run_cycles<S, T, P>(
    config: &RunConfig,
    recycler: Recycler<S>,
    mut population: Population<S>,
    mut flux: FluxLedger,
    start_cycle: usize,
    seed_progress: Option<f64>,
    master_seed: u64,
    stepper: &T,
    progress: &P,
) -> Result<RunSummary<S>, RareError>
where
    S: WalkerState,
    T: Stepper<S> + ?Sized,
    P: ProgressCoordinate<S> + ?Sized,
{
    let binner = Binner::new(config.edges.clone())?;
    let resampler = SplitMerger::new(config.n_reps, config.min_weight)?;
    let checkpointer = config
        .output
        .checkpoint_directory()
        .map(|directory| Checkpointer::new(directory, config.checkpoint.max_to_keep));
    let mut cycle_log = match config.output.cycle_log_path() {
        Some(path) => Some(CycleLog::open(&path, recycler.boundaries().len(), start_cycle > 0)?),
        None => None,
    };
    let mut progress_log = match config.output.progress_log_path() {
        Some(path) => Some(ProgressLog::open(&path, start_cycle > 0)?),
        None => None,
    };
    if let (Some(log), Some(seed_progress)) = (progress_log.as_mut(), seed_progress) {
        log.record_seed(seed_progress)
            .map_err(|err| err.with_context("phase", Phase::Logging.as_str()))?;
    }
    let front_is_max = matches!(
        recycler.boundaries().first(),
        Some(boundary) if boundary.direction == Direction::Forward
    );

    let mut records = Vec::new();
    for cycle in start_cycle..config.n_cycles {
        let at = |phase: Phase| {
            move |err: RareError| {
                err.with_context("phase", phase.as_str())
                    .with_context("cycle", cycle.to_string())
            }
        };
        if population.is_empty() {
            return Err(RareError::Population(
                ErrorInfo::new("empty-population", "no walkers left to step")
                    .with_context("cycle", cycle.to_string())
                    .with_hint("check the bin edges and boundaries"),
            ));
        }
        let weight_before = population.total_weight();

        step_all(&mut population, stepper, cycle).map_err(at(Phase::Stepping))?;
        evaluate_missing(&mut population, progress).map_err(at(Phase::Evaluating))?;
        let front = front_of(&population, front_is_max);
        let stepped: Vec<f64> = population.iter().filter_map(|walker| walker.progress()).collect();
        population = binner.assign(population).map_err(at(Phase::Binning))?;

        let (recycled, report) = recycler.recycle(population).map_err(at(Phase::Recycling))?;
        population = recycled;
        let refreshed =
            evaluate_missing(&mut population, progress).map_err(at(Phase::Evaluating))?;
        population = binner.assign(population).map_err(at(Phase::Binning))?;
        debug!(cycle, recycled = report.recycled.len(), refreshed, "recycling done");

        let mut rng = determinism::resample_rng(master_seed, cycle);
        let (resampled, resample_report) = resampler
            .resample(population, &mut rng)
            .map_err(at(Phase::Resampling))?;
        population = resampled;

        population
            .check_weights()
            .map_err(at(Phase::Resampling))?;
        let weight_after = population.total_weight();
        if (weight_after - weight_before).abs() > CONSERVATION_TOLERANCE {
            return Err(RareError::Population(
                ErrorInfo::new("weight-drift", "total weight changed during the cycle")
                    .with_context("cycle", cycle.to_string())
                    .with_context("before", weight_before.to_string())
                    .with_context("after", weight_after.to_string()),
            ));
        }
        flux.record(&report)?;

        let occupancy = population.occupancy();
        let record = CycleRecord {
            cycle,
            walkers: population.len(),
            bin_low: occupancy.keys().next().copied(),
            bin_high: occupancy.keys().next_back().copied(),
            occupied_bins: occupancy.len(),
            front,
            progress: stepped,
            flux: report.flux.clone(),
            cumulative_flux: flux.total(),
            splits: resample_report.splits,
            merges: resample_report.merges,
            starved_bins: resample_report.starved_bins.len(),
            total_weight: weight_after,
        };
        info!(
            cycle,
            walkers = record.walkers,
            bin_low = ?record.bin_low,
            bin_high = ?record.bin_high,
            flux = record.total_flux(),
            cumulative_flux = record.cumulative_flux,
            "cycle complete"
        );
        if let Some(log) = cycle_log.as_mut() {
            log.record(&record).map_err(at(Phase::Logging))?;
        }
        if let Some(log) = progress_log.as_mut() {
            log.record(&record).map_err(at(Phase::Logging))?;
        }
        records.push(record);

        let completed = cycle + 1;
        if completed % config.check_freq == 0 || completed == config.n_cycles {
            if let Some(checkpointer) = &checkpointer {
                let payload =
                    CheckpointPayload::new(completed, master_seed, population.clone(), flux.clone());
                checkpointer
                    .save(&payload)
                    .map_err(at(Phase::Checkpointing))?;
            }
        }
    }

    let checkpoints = match &checkpointer {
        Some(checkpointer) => checkpointer.list()?,
        None => Vec::new(),
    };
    let cycles_completed = config.n_cycles.max(start_cycle);
    let manifest_path = match (&config.output.run_directory, config.output.manifest_path()) {
        (Some(run_dir), Some(path)) => {
            let manifest = RunManifest {
                config: config.clone(),
                provenance: manifest::provenance(config)?,
                cycles_completed,
                final_walkers: population.len(),
                cumulative_flux: flux.cumulative().to_vec(),
                mean_flux: flux.mean_flux(),
                cycle_log: Some(config.output.cycle_log.clone()),
                checkpoints: relative_to(run_dir, &checkpoints),
            };
            manifest.write(&path)?;
            Some(path)
        }
        _ => None,
    };

    info!(
        cycles = cycles_completed,
        walkers = population.len(),
        cumulative_flux = flux.total(),
        "weighted-ensemble run finished"
    );
    Ok(RunSummary {
        start_cycle,
        cycles_completed,
        population,
        flux,
        records,
        cycle_log: cycle_log.map(|log| log.path().to_path_buf()),
        progress_log: progress_log.map(|log| log.path().to_path_buf()),
        manifest_path,
        checkpoints,
    })
}

/// Advances every walker in parallel; nothing is committed unless all succeed.
fn step_all<S, T>(population: &mut Population<S>, stepper: &T, cycle: usize) -> Result<(), RareError>
where
    S: WalkerState,
    T: Stepper<S> + ?Sized,
{
    let stepped = population
        .walkers()
        .par_iter()
        .map(|walker| {
            let ctx = StepContext {
                cycle,
                walker: walker.id().as_raw(),
            };
            stepper.advance(walker.state(), &ctx)
        })
        .collect::<Result<Vec<S>, RareError>>()?;
    for (walker, state) in population.walkers_mut().iter_mut().zip(stepped) {
        walker.advance_to(state);
    }
    Ok(())
}

/// Evaluates the walkers without a cached coordinate; returns how many were evaluated.
fn evaluate_missing<S, P>(population: &mut Population<S>, progress: &P) -> Result<usize, RareError>
where
    S: WalkerState,
    P: ProgressCoordinate<S> + ?Sized,
{
    let values = population
        .walkers()
        .par_iter()
        .enumerate()
        .filter(|(_, walker)| walker.progress().is_none())
        .map(|(index, walker)| -> Result<(usize, f64), RareError> {
            let value = progress.evaluate(walker.state())?;
            if !value.is_finite() {
                return Err(RareError::Progress(
                    ErrorInfo::new("non-finite-progress", "progress coordinate is not finite")
                        .with_context("walker", walker.id().to_string()),
                ));
            }
            Ok((index, value))
        })
        .collect::<Result<Vec<(usize, f64)>, RareError>>()?;
    let walkers = population.walkers_mut();
    for (index, value) in &values {
        walkers[*index].set_progress(*value);
    }
    Ok(values.len())
}

fn front_of<S>(population: &Population<S>, maximum: bool) -> Option<f64> {
    let values = population.iter().filter_map(|walker| walker.progress());
    if maximum {
        values.reduce(f64::max)
    } else {
        values.reduce(f64::min)
    }
}

fn relative_to(root: &Path, paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter_map(|path| path.strip_prefix(root).ok().map(Path::to_path_buf))
        .collect()
}
