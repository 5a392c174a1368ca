use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rare_core::errors::ErrorInfo;
use rare_core::{ProgressCoordinate, RareError, StepContext, Stepper};
use rare_we::checkpoint::checkpoint_path;
use rare_we::manifest::RunManifest;
use rare_we::{resume, run, CheckpointPayload, FluxLedger, Population, RunConfig};
use tempfile::tempdir;

fn drift(state: &f64, ctx: &StepContext) -> Result<f64, RareError> {
    Ok(state + 0.3 + 0.1 * (ctx.walker % 3) as f64)
}

fn identity(state: &f64) -> Result<f64, RareError> {
    Ok(*state)
}

fn fail_on_third_cycle(state: &f64, ctx: &StepContext) -> Result<f64, RareError> {
    if ctx.cycle == 2 {
        return Err(RareError::Step(
            ErrorInfo::new("engine-exit", "engine exited with status 1")
                .with_context("walker", ctx.walker.to_string()),
        ));
    }
    drift(state, ctx)
}

struct CountingStepper {
    calls: AtomicUsize,
}

impl Stepper<f64> for CountingStepper {
    fn advance(&self, state: &f64, ctx: &StepContext) -> Result<f64, RareError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        drift(state, ctx)
    }
}

struct CountingProgress {
    calls: AtomicUsize,
}

impl ProgressCoordinate<f64> for CountingProgress {
    fn evaluate(&self, state: &f64) -> Result<f64, RareError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*state)
    }
}

fn base_config() -> RunConfig {
    RunConfig {
        n_reps: 3,
        n_cycles: 12,
        edges: vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0],
        target_pc: Some(2.5),
        check_freq: 2,
        ..RunConfig::default()
    }
}

fn with_output(mut config: RunConfig, root: &Path) -> RunConfig {
    config.output.run_directory = Some(root.to_path_buf());
    config
}

#[test]
fn runs_conserve_weight_and_collect_flux() {
    let config = base_config();
    let summary = run(&config, 0.0, &drift, &identity).unwrap();

    assert_eq!(summary.cycles_completed, 12);
    assert_eq!(summary.records.len(), 12);
    for record in &summary.records {
        assert!((record.total_weight - 1.0).abs() < 1e-9);
    }
    assert!(summary.flux.total() > 0.0);
    assert_eq!(summary.flux.cycles(), 12);
    let per_cycle: f64 = summary.records.iter().map(|record| record.total_flux()).sum();
    assert!((per_cycle - summary.flux.total()).abs() < 1e-12);
    assert!((summary.population.total_weight() - 1.0).abs() < 1e-9);
}

#[test]
fn identical_seeds_give_identical_runs() {
    let config = base_config();
    let first = run(&config, 0.0, &drift, &identity).unwrap();
    let second = run(&config, 0.0, &drift, &identity).unwrap();
    assert_eq!(first.population, second.population);
    assert_eq!(first.flux, second.flux);
    assert_eq!(first.records, second.records);
}

#[test]
fn restart_matches_an_uninterrupted_run() {
    let full_dir = tempdir().unwrap();
    let split_dir = tempdir().unwrap();

    let full = run(&with_output(base_config(), full_dir.path()), 0.0, &drift, &identity).unwrap();

    let mut first_leg = with_output(base_config(), split_dir.path());
    first_leg.n_cycles = 5;
    let partial = run(&first_leg, 0.0, &drift, &identity).unwrap();
    assert_eq!(partial.cycles_completed, 5);

    let mut second_leg = with_output(base_config(), split_dir.path());
    second_leg.restart = true;
    let resumed = run(&second_leg, 0.0, &drift, &identity).unwrap();

    assert_eq!(resumed.start_cycle, 5);
    assert_eq!(resumed.records.len(), 7);
    assert_eq!(resumed.population, full.population);
    assert_eq!(resumed.flux, full.flux);

    let log = fs::read_to_string(resumed.cycle_log.unwrap()).unwrap();
    assert_eq!(log.lines().count(), 13);
    assert_eq!(log.lines().filter(|line| line.starts_with("cycle,")).count(), 1);

    let progress = fs::read_to_string(resumed.progress_log.unwrap()).unwrap();
    assert_eq!(progress.lines().count(), 14);
    assert_eq!(progress.lines().filter(|line| line.starts_with("seed,")).count(), 1);
}

#[test]
fn resume_from_explicit_checkpoint() {
    let dir = tempdir().unwrap();
    let config = with_output(base_config(), dir.path());
    let summary = run(&config, 0.0, &drift, &identity).unwrap();

    let middle = checkpoint_path(&dir.path().join("checkpoints"), 10);
    assert!(summary
        .checkpoints
        .iter()
        .any(|path| path.ends_with("ckpt_00010.json")));
    let resumed = resume(&config, &middle, 0.0, &drift, &identity).unwrap();
    assert_eq!(resumed.start_cycle, 10);
    assert_eq!(resumed.population, summary.population);
}

#[test]
fn outputs_land_in_the_run_directory() {
    let dir = tempdir().unwrap();
    let mut config = with_output(base_config(), dir.path());
    config.checkpoint.max_to_keep = 2;
    let summary = run(&config, 0.0, &drift, &identity).unwrap();

    assert_eq!(summary.checkpoints.len(), 2);
    assert!(summary.checkpoints[1].ends_with("ckpt_00012.json"));

    let manifest = RunManifest::load(&summary.manifest_path.unwrap()).unwrap();
    assert_eq!(manifest.cycles_completed, 12);
    assert_eq!(manifest.provenance.seed, config.seed_policy.master_seed);
    assert_eq!(manifest.provenance.config_hash.len(), 64);
    assert_eq!(manifest.checkpoints.len(), 2);
    assert!(manifest.checkpoints[0].is_relative());

    let log = fs::read_to_string(dir.path().join("cycles.csv")).unwrap();
    let header = log.lines().next().unwrap();
    assert!(header.starts_with("cycle,walkers,bin_low,bin_high,occupied_bins,front,flux_0,"));
    assert_eq!(log.lines().count(), 13);
}

#[test]
fn step_failure_stops_the_run() {
    let err = run(&base_config(), 0.0, &fail_on_third_cycle, &identity).unwrap_err();
    assert_eq!(err.family(), "step");
    assert_eq!(err.info().context["phase"], "stepping");
    assert_eq!(err.info().context["cycle"], "2");
}

#[test]
fn corrupt_restart_halts_before_stepping() {
    let dir = tempdir().unwrap();
    let mut population = Population::new();
    population.spawn(0.0_f64, 0.5);
    population.spawn(0.0_f64, 0.2);
    let payload = CheckpointPayload::new(4, 1, population, FluxLedger::new(1));
    payload
        .store(&checkpoint_path(&dir.path().join("checkpoints"), 4))
        .unwrap();

    let mut config = with_output(base_config(), dir.path());
    config.restart = true;
    let stepper = CountingStepper {
        calls: AtomicUsize::new(0),
    };
    let err = run(&config, 0.0, &stepper, &identity).unwrap_err();
    assert_eq!(err.family(), "checkpoint");
    assert_eq!(stepper.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn restart_without_checkpoint_is_an_error() {
    let dir = tempdir().unwrap();
    let mut config = with_output(base_config(), dir.path());
    config.restart = true;
    let err = run(&config, 0.0, &drift, &identity).unwrap_err();
    assert_eq!(err.info().code, "no-checkpoint");
}

#[test]
fn every_walker_is_stepped_once_per_cycle() {
    let mut config = base_config();
    config.n_cycles = 1;
    config.target_pc = None;
    let stepper = CountingStepper {
        calls: AtomicUsize::new(0),
    };
    let summary = run(&config, 0.0, &stepper, &identity).unwrap();
    assert_eq!(stepper.calls.load(Ordering::SeqCst), 3);
    assert!(summary.flux.cumulative().is_empty());
}

#[test]
fn progress_is_evaluated_once_per_new_state() {
    let mut config = base_config();
    config.n_reps = 4;
    config.n_cycles = 1;
    let stepper = |_: &f64, _: &StepContext| -> Result<f64, RareError> { Ok(3.0) };
    let progress = CountingProgress {
        calls: AtomicUsize::new(0),
    };
    let summary = run(&config, 0.0, &stepper, &progress).unwrap();

    let recycled = 4;
    assert_eq!(progress.calls.load(Ordering::SeqCst), 1 + config.n_reps + recycled);
    assert_eq!(summary.flux.cumulative(), &[1.0]);
    assert_eq!(summary.population.len(), 4);
    assert_eq!(summary.records[0].progress, vec![3.0; 4]);
}

#[test]
fn progress_log_holds_the_seed_and_every_stepped_walker() {
    let dir = tempdir().unwrap();
    let config = with_output(base_config(), dir.path());
    let summary = run(&config, 0.0, &drift, &identity).unwrap();

    for record in &summary.records {
        assert!(!record.progress.is_empty());
        let highest = record.progress.iter().copied().fold(f64::MIN, f64::max);
        assert_eq!(record.front, Some(highest));
    }

    let path = summary.progress_log.unwrap();
    assert!(path.ends_with("progress.csv"));
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(&path)
        .unwrap();
    assert_eq!(reader.headers().unwrap(), vec!["stage", "cycle", "progress"]);
    let rows: Vec<csv::StringRecord> = reader.records().map(|row| row.unwrap()).collect();
    assert_eq!(rows.len(), 13);
    assert_eq!(&rows[0], vec!["seed", "0", "0"]);
    for (row, record) in rows[1..].iter().zip(&summary.records) {
        assert_eq!(&row[0], "step");
        assert_eq!(row[1].parse::<usize>().unwrap(), record.cycle);
        let values: Vec<f64> = row.iter().skip(2).map(|v| v.parse().unwrap()).collect();
        assert_eq!(values, record.progress);
    }
}

#[test]
fn invalid_config_is_rejected_before_running() {
    let mut config = base_config();
    config.n_reps = 0;
    let err = run(&config, 0.0, &drift, &identity).unwrap_err();
    assert_eq!(err.family(), "config");
}
