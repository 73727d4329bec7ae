//! Test: atoms whose outputs are declared by the step's own params

use crate::helpers::*;
use mise::atom::CONFIGURED_OUTPUTS;
use mise::core::config::StepConfig;
use mise::{ConfigValidationError, PipelineError};
use serde_json::json;
use std::path::Path;

fn read_csv(location: &Path, columns: serde_json::Value) -> StepConfig {
    StepConfig::new("ReadCSV")
        .with_param("location", json!(location.to_string_lossy()))
        .with_param("columns", columns)
        .with_output(CONFIGURED_OUTPUTS, CONFIGURED_OUTPUTS)
}

#[tokio::test]
async fn test_configured_columns_feed_downstream_steps() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("sales.csv");
    std::fs::write(&input, "region,units,notes\nnorth,12,x\nsouth,7,y\neast,30,z\n").unwrap();

    let config = csv_pipeline(
        "sales",
        &root.path().join("data"),
        vec![
            read_csv(&input, json!({"region": "string", "units": "int"}))
                .with_return("region", "regions"),
            StepConfig::new("DivisibleByNTask")
                .with_input("to_divide", "units")
                .with_output("divisible", "even")
                .with_return("divisible", "even"),
        ],
    );

    let result = run(config).await.unwrap();
    assert_eq!(
        result.returned("regions"),
        &[json!("north"), json!("south"), json!("east")]
    );
    assert_eq!(result.returned("even"), &[json!(true), json!(false), json!(true)]);

    // Both steps share the document the loader started
    let document = result.document("ReadCSV");
    assert_eq!(document.row_count(), 3);
    assert!(document.has_column("region"));
    assert!(document.has_column("units"));
    assert!(document.has_column("even"));
    assert!(!document.has_column("notes"));
}

#[test]
fn test_configured_column_types_are_wired() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("sales.csv");
    let config = csv_pipeline(
        "mistyped",
        root.path(),
        vec![
            read_csv(&input, json!({"units": "string"})),
            StepConfig::new("DivisibleByNTask").with_input("to_divide", "units"),
        ],
    );

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::PortTypeMismatch { step: 1, ref found, .. })
            if found == "string"
    ));
}

#[test]
fn test_output_outside_configured_columns_is_rejected() {
    let root = tempfile::tempdir().unwrap();
    let input = root.path().join("sales.csv");
    let config = csv_pipeline(
        "undeclared",
        root.path(),
        vec![StepConfig::new("ReadCSV")
            .with_param("location", json!(input.to_string_lossy()))
            .with_param("columns", json!({"units": "int"}))
            .with_output("score", "score")],
    );

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::UnknownPort { direction: "output", ref port, .. })
            if port == "score"
    ));
}
