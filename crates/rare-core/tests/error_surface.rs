use rare_core::errors::{ErrorInfo, RareError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("walker", "3")
        .with_context("cycle", "12")
}

#[test]
fn step_error_surface() {
    let err = RareError::Step(sample_info("engine-exit", "engine exited with status 1"));
    assert_eq!(err.info().code, "engine-exit");
    assert!(err.info().context.contains_key("walker"));
    assert_eq!(err.family(), "step");
}

#[test]
fn checkpoint_error_surface() {
    let err = RareError::Checkpoint(
        sample_info("weight-normalisation", "weights do not sum to one").with_hint("rerun"),
    );
    assert_eq!(err.info().hint.as_deref(), Some("rerun"));
    assert_eq!(err.family(), "checkpoint");
}

#[test]
fn display_includes_context_and_hint() {
    let err = RareError::Population(
        ErrorInfo::new("empty-population", "no walkers left")
            .with_context("cycle", "4")
            .with_hint("check the recycler boundaries"),
    );
    let rendered = err.to_string();
    assert!(rendered.starts_with("population error: [empty-population] no walkers left"));
    assert!(rendered.contains("cycle=4"));
    assert!(rendered.contains("hint: check the recycler boundaries"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = RareError::Resample(ErrorInfo::new("unbinned-walker", "walker has no bin"));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["family"], "Resample");
    let decoded: RareError = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, err);
}
