//! Test: forward-only wiring checks run before any storage exists

use crate::helpers::*;
use mise::core::config::{PipelineConfig, StepConfig};
use mise::storage::CacheDirective;
use mise::{ConfigValidationError, PipelineError};

fn unresolved_pipeline(root: &std::path::Path) -> PipelineConfig {
    csv_pipeline(
        "unresolved",
        root,
        vec![
            StepConfig::new("ListPrimeFactorsTask")
                .with_input("to_factor", "numbers")
                .with_output("factors", "factors"),
            series(&[1, 2, 3]),
        ],
    )
}

#[tokio::test]
async fn test_two_step_pipeline_assembles() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "numbers",
        root.path(),
        vec![
            series(&[4, 9]),
            StepConfig::new("ListPrimeFactorsTask")
                .with_input("to_factor", "numbers")
                .with_output("factors", "factors"),
        ],
    );

    let pipeline = assemble(config).unwrap();

    assert_eq!(pipeline.len(), 2);
    assert_eq!(pipeline.strategy, "PandasStrategy");
    assert!(pipeline.run_directory.as_deref().unwrap().starts_with(root.path()));
    assert_eq!(pipeline.cache_plan(), vec![CacheDirective::None; 2]);
    assert_eq!(run_directories(root.path(), "numbers"), 1);
}

#[tokio::test]
async fn test_input_from_later_step_is_unresolved() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");

    let err = assemble(unresolved_pipeline(&data)).err().unwrap();

    match err {
        PipelineError::Config(ConfigValidationError::UnresolvedBinding { step, binding, .. }) => {
            assert_eq!(step, 0);
            assert_eq!(binding, "numbers");
        }
        other => panic!("unexpected error: {other}"),
    }
    // Nothing was written for a pipeline that failed validation
    assert!(!data.exists());
}

#[tokio::test]
async fn test_port_type_mismatch() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "mismatch",
        root.path(),
        vec![
            series(&[4, 9]),
            StepConfig::new("ListPrimeFactorsTask")
                .with_input("to_factor", "numbers")
                .with_output("factors", "factors"),
            StepConfig::new("DivisibleByNTask")
                .with_input("to_divide", "factors")
                .with_output("divisible", "divisible"),
        ],
    );

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::PortTypeMismatch { step: 2, .. })
    ));
}

#[tokio::test]
async fn test_wildcard_input_accepts_any_type() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "wildcard",
        root.path(),
        vec![
            series(&[4, 9]),
            StepConfig::new("ListPrimeFactorsTask")
                .with_input("to_factor", "numbers")
                .with_output("factors", "factors"),
            StepConfig::new("PrintFieldTask").with_input("to_print", "factors"),
        ],
    );

    assert!(assemble(config).is_ok());
}

#[tokio::test]
async fn test_binding_produced_twice() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline("twice", root.path(), vec![series(&[1]), series(&[2])]);

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::DuplicateBinding { step: 1, .. })
    ));
}

#[tokio::test]
async fn test_duplicate_return_name() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "returns",
        root.path(),
        vec![
            series(&[4]).with_return("numbers", "out"),
            StepConfig::new("DivisibleByNTask")
                .with_input("to_divide", "numbers")
                .with_output("divisible", "divisible")
                .with_return("divisible", "out"),
        ],
    );

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::DuplicateReturn { step: 1, .. })
    ));
}

#[tokio::test]
async fn test_missing_input_port() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "missing-port",
        root.path(),
        vec![
            series(&[4]),
            StepConfig::new("DivisibleByNTask").with_output("divisible", "divisible"),
        ],
    );

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::MissingPort { step: 1, .. })
    ));
}

#[tokio::test]
async fn test_unknown_atom_and_strategy() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline("unknown", root.path(), vec![StepConfig::new("NotAnAtom")]);
    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::UnknownAtom { step: 0, .. })
    ));

    let mut config = csv_pipeline("unknown", root.path(), vec![series(&[1])]);
    if let Some(strategy) = config.data_strategy.as_mut() {
        strategy.id = "ParquetStrategy".into();
    }
    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::UnknownStrategy(ref name)) if name == "ParquetStrategy"
    ));
}

#[test]
fn test_name_escaping_the_data_location_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");
    let config = csv_pipeline("../outside", &data, vec![series(&[1, 2])]);

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::InvalidName(ref name)) if name == "../outside"
    ));
    assert!(!data.exists());
    assert!(!root.path().join("outside-meta.json").exists());
}
