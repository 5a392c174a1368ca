use std::fs;

use rare_we::checkpoint::{checkpoint_path, CHECKPOINT_SCHEMA};
use rare_we::{
    summarize, Binner, CheckpointPayload, Checkpointer, FluxLedger, Population, RecycleReport,
};
use tempfile::tempdir;

fn sample_population() -> Population<f64> {
    let binner = Binner::new(vec![0.0, 1.0, 2.0, 3.0]).unwrap();
    let mut population = Population::new();
    for (weight, progress) in [(0.1, 0.25), (0.2, 1.5), (0.3, 1.75), (0.4, 2.9)] {
        population.spawn(progress, weight);
    }
    for walker in population.walkers_mut() {
        let progress = *walker.state();
        walker.set_progress(progress);
    }
    binner.assign(population).unwrap()
}

fn sample_ledger() -> FluxLedger {
    let mut ledger = FluxLedger::new(1);
    ledger
        .record(&RecycleReport {
            flux: vec![0.1 / 3.0],
            recycled: Vec::new(),
        })
        .unwrap();
    ledger
}

#[test]
fn save_then_load_restores_population_and_cycle() {
    let dir = tempdir().unwrap();
    let checkpointer = Checkpointer::new(dir.path().join("checkpoints"), 4);
    let payload = CheckpointPayload::new(7, 42, sample_population(), sample_ledger());

    let path = checkpointer.save(&payload).unwrap();
    assert_eq!(path, checkpoint_path(checkpointer.directory(), 7));
    assert!(!path.with_extension("json.tmp").exists());

    let (latest, restored) = checkpointer.load_latest::<f64>().unwrap().unwrap();
    assert_eq!(latest, path);
    assert_eq!(restored, payload);
    assert_eq!(restored.schema, CHECKPOINT_SCHEMA);
    assert_eq!(
        restored.population.walkers()[0].weight().to_bits(),
        0.1f64.to_bits()
    );
}

#[test]
fn retention_keeps_the_newest_checkpoints() {
    let dir = tempdir().unwrap();
    let checkpointer = Checkpointer::new(dir.path(), 2);
    for cycle in [1, 2, 3, 10] {
        let payload = CheckpointPayload::new(cycle, 1, sample_population(), FluxLedger::new(1));
        checkpointer.save(&payload).unwrap();
    }
    let names: Vec<String> = checkpointer
        .list()
        .unwrap()
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["ckpt_00003.json", "ckpt_00010.json"]);
}

#[test]
fn missing_directory_has_no_latest_checkpoint() {
    let dir = tempdir().unwrap();
    let checkpointer = Checkpointer::new(dir.path().join("absent"), 2);
    assert!(checkpointer.load_latest::<f64>().unwrap().is_none());
}

#[test]
fn non_normalised_weights_are_rejected_on_load() {
    let dir = tempdir().unwrap();
    let mut population = Population::new();
    population.spawn(0.5_f64, 0.3);
    population.spawn(0.5_f64, 0.4);
    let payload = CheckpointPayload::new(3, 1, population, FluxLedger::new(0));
    payload.store(&checkpoint_path(dir.path(), 3)).unwrap();

    let err = Checkpointer::new(dir.path(), 2)
        .load_latest::<f64>()
        .unwrap_err();
    assert_eq!(err.family(), "checkpoint");
    assert_eq!(err.info().code, "weight-normalisation");
}

#[test]
fn negative_weights_are_rejected_on_load() {
    let mut population = Population::new();
    population.spawn(0.5_f64, 1.5);
    population.spawn(0.5_f64, -0.5);
    let payload = CheckpointPayload::new(3, 1, population, FluxLedger::new(0));
    let err = payload.validate().unwrap_err();
    assert_eq!(err.family(), "checkpoint");
    assert_eq!(err.info().code, "invalid-weight");
}

#[test]
fn duplicate_walker_ids_are_rejected_on_load() {
    let dir = tempdir().unwrap();
    let payload = CheckpointPayload::new(3, 1, Population::uniform(0.5_f64, 2), FluxLedger::new(0));
    let mut json = serde_json::to_value(&payload).unwrap();
    json["population"]["walkers"][1]["id"] = serde_json::json!(0);
    json["population"]["next_id"] = serde_json::json!(0);
    let path = checkpoint_path(dir.path(), 3);
    fs::write(&path, serde_json::to_string(&json).unwrap()).unwrap();

    let restored = CheckpointPayload::<f64>::load(&path).unwrap();
    let err = restored.validate().unwrap_err();
    assert_eq!(err.family(), "checkpoint");
    assert_eq!(err.info().code, "duplicate-walker-id");
    assert!(Checkpointer::new(dir.path(), 2).load_latest::<f64>().is_err());
}

#[test]
fn id_counter_behind_the_walkers_is_rejected() {
    let payload = CheckpointPayload::new(3, 1, Population::uniform(0.5_f64, 2), FluxLedger::new(0));
    let mut json = serde_json::to_value(&payload).unwrap();
    json["population"]["next_id"] = serde_json::json!(1);
    let restored: CheckpointPayload<f64> = serde_json::from_value(json).unwrap();
    let err = restored.validate().unwrap_err();
    assert_eq!(err.family(), "checkpoint");
    assert_eq!(err.info().code, "stale-id-counter");
}

#[test]
fn truncated_checkpoint_is_a_checkpoint_error() {
    let dir = tempdir().unwrap();
    let path = checkpoint_path(dir.path(), 1);
    fs::write(&path, "{\"schema\":").unwrap();
    let err = CheckpointPayload::<f64>::load(&path).unwrap_err();
    assert_eq!(err.info().code, "checkpoint-parse");
}

#[test]
fn summary_reads_the_latest_checkpoint_of_a_directory() {
    let dir = tempdir().unwrap();
    let checkpointer = Checkpointer::new(dir.path(), 4);
    checkpointer
        .save(&CheckpointPayload::new(2, 5, sample_population(), sample_ledger()))
        .unwrap();
    checkpointer
        .save(&CheckpointPayload::new(4, 5, sample_population(), sample_ledger()))
        .unwrap();

    let summary = summarize(dir.path()).unwrap();
    assert_eq!(summary.cycle, 4);
    assert_eq!(summary.walkers, 4);
    assert_eq!(summary.bins[&1].walkers, 2);
    assert_eq!(summary.cumulative_flux.len(), 1);
    assert!(summary.to_string().contains("cycle: 4"));
}
