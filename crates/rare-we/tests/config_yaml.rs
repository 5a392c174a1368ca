use rare_we::{Boundary, Direction, RunConfig};

const TWO_BOUNDARY_RUN: &str = r#"
n_reps: 4
n_cycles: 200
edges: [0.0, 2.0, 4.0, 6.0, 8.0, 10.0]
target_pc: 9.5
boundaries:
  - target: 0.5
    direction: retrograde
check_freq: 10
seed_policy:
  master_seed: 1234
  label: two-state
output:
  run_directory: runs/we
"#;

#[test]
fn yaml_defaults_fill_optional_fields() {
    let config = RunConfig::from_yaml_str(TWO_BOUNDARY_RUN).unwrap();
    assert_eq!(config.n_reps, 4);
    assert!(!config.restart);
    assert_eq!(config.min_weight, 1e-12);
    assert_eq!(config.checkpoint.max_to_keep, 4);
    assert_eq!(config.seed_policy.master_seed, 1234);
    assert_eq!(config.output.cycle_log.to_str(), Some("cycles.csv"));
    assert_eq!(config.output.progress_log.to_str(), Some("progress.csv"));
    assert_eq!(
        config.output.checkpoint_directory().unwrap(),
        std::path::Path::new("runs/we/checkpoints")
    );
}

#[test]
fn shorthand_boundary_comes_first() {
    let config = RunConfig::from_yaml_str(TWO_BOUNDARY_RUN).unwrap();
    assert_eq!(
        config.resolved_boundaries(),
        vec![Boundary::forward(9.5), Boundary::retrograde(0.5)]
    );

    let mut retrograde = config.clone();
    retrograde.retrograde = true;
    retrograde.boundaries.clear();
    assert_eq!(
        retrograde.resolved_boundaries()[0].direction,
        Direction::Retrograde
    );
}

#[test]
fn validation_rejects_unusable_values() {
    let base = RunConfig::from_yaml_str(TWO_BOUNDARY_RUN).unwrap();

    let mut zero_cycles = base.clone();
    zero_cycles.n_cycles = 0;
    assert_eq!(zero_cycles.validate().unwrap_err().info().code, "zero-count");

    let mut zero_freq = base.clone();
    zero_freq.check_freq = 0;
    assert!(zero_freq.validate().is_err());

    let mut unordered = base.clone();
    unordered.edges = vec![0.0, 3.0, 3.0];
    assert_eq!(unordered.validate().unwrap_err().info().code, "invalid-edges");

    let mut bad_floor = base.clone();
    bad_floor.min_weight = -1.0;
    assert!(bad_floor.validate().is_err());

    let mut bad_target = base;
    bad_target.target_pc = Some(f64::NAN);
    assert_eq!(
        bad_target.validate().unwrap_err().info().code,
        "non-finite-target"
    );
}

#[test]
fn malformed_yaml_is_a_config_error() {
    let err = RunConfig::from_yaml_str("n_reps: [").unwrap_err();
    assert_eq!(err.family(), "config");
    assert_eq!(err.info().code, "config-parse");
}
