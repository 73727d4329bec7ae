//! Test: outputs are partitioned across documents and filters shrink them

use crate::helpers::*;
use mise::core::config::{PipelineConfig, StepConfig};
use mise::storage::StrategyRegistry;
use mise::core::StorageError;
use mise::{run_pipeline, AtomError, ExecutionStatus, PipelineError};
use serde_json::json;

#[tokio::test]
async fn test_filter_drops_rows_from_backing_document() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "filtered",
        root.path(),
        vec![
            series(&[10, 60, 75, 40, 90]).with_return("numbers", "numbers"),
            StepConfig::new("FilterBelowN")
                .with_param("n", json!(50))
                .with_input("to_compare", "numbers"),
            StepConfig::new("DivisibleByNTask")
                .with_input("to_divide", "numbers")
                .with_output("divisible", "divisible")
                .with_return("divisible", "even"),
        ],
    );

    let result = run(config).await.unwrap();

    // Returned before the filter ran
    assert_eq!(result.returned("numbers").len(), 5);
    assert_eq!(
        result.returned("even"),
        &[json!(true), json!(false), json!(true)]
    );

    let document = result.document("SeriesTask");
    assert_eq!(document.row_count(), 3);
    assert!(document.has_column("numbers"));
    assert!(document.has_column("divisible"));
}

#[tokio::test]
async fn test_new_document_atom_gets_its_own_file() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "multi",
        root.path(),
        vec![
            series(&[12, 30, 18]),
            StepConfig::new("ListPrimeFactorsTask")
                .with_input("to_factor", "numbers")
                .with_output("factors", "factors"),
            StepConfig::new("MostCommonTask")
                .with_param("top_n", json!(2))
                .with_input("to_count", "factors")
                .with_output("top_elements", "top")
                .with_return("top_elements", "top"),
            StepConfig::new("PrintFieldTask").with_input("to_print", "top"),
        ],
    );

    let result = run(config).await.unwrap();

    assert_eq!(result.outcome.status, ExecutionStatus::Completed);
    assert_eq!(result.returned("top"), &[json!(2), json!(3)]);

    let numbers = result.document("SeriesTask");
    assert_eq!(numbers.row_count(), 3);
    assert!(numbers.has_column("factors"));
    assert!(!numbers.has_column("top"));

    let top = result.document("MostCommonTask");
    assert_eq!(top.row_count(), 2);
    assert_eq!(top.column_names().collect::<Vec<_>>(), vec!["top"]);
}

#[tokio::test]
async fn test_second_source_starts_a_suffixed_document() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "sources",
        root.path(),
        vec![
            series(&[1, 2, 3]),
            StepConfig::new("SeriesTask")
                .with_param("values", json!([4, 5]))
                .with_output("numbers", "more_numbers"),
        ],
    );

    let result = run(config).await.unwrap();

    assert_eq!(result.document("SeriesTask").row_count(), 3);
    assert_eq!(result.document("SeriesTask-1").row_count(), 2);
}

#[tokio::test]
async fn test_yaml_pipeline_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let yaml = format!(
        r#"
name: yaml_sample
data_strategy:
  id: PandasStrategy
  data_location: "{}"
steps:
  - GenerateRandomSeriesTask:
      params:
        sample_size: 8
        rand_range: 50
      outputs:
        numbers: numbers
      returns:
        numbers: numbers
  - ListPrimeFactorsTask:
      inputs:
        to_factor: numbers
      outputs:
        factors: factors
      load_if_cached: true
  - CountItemsTask:
      inputs:
        to_count: factors
      outputs:
        counted: counted
      returns:
        counted: counted
"#,
        root.path().display()
    );

    let config = PipelineConfig::from_yaml(&yaml).unwrap();
    let outcome = run_pipeline(config, &test_registry(), &StrategyRegistry::with_builtin())
        .await
        .unwrap();

    assert_eq!(outcome.status, ExecutionStatus::Completed);
    let numbers = outcome.returns["numbers"].as_array().unwrap();
    let counted = outcome.returns["counted"].as_array().unwrap();
    assert_eq!(numbers.len(), 8);
    assert_eq!(counted.len(), 8);
    assert!(numbers.iter().all(|n| (0..50).contains(&n.as_i64().unwrap())));
    assert!(root.path().join("yaml_sample-meta.json").exists());
}

#[tokio::test]
async fn test_inputs_spanning_documents_fail_the_step() {
    let root = tempfile::tempdir().unwrap();
    let config = csv_pipeline(
        "spanning",
        root.path(),
        vec![
            series(&[1, 2, 3]),
            StepConfig::new("SeriesTask")
                .with_param("values", json!([4, 5, 6]))
                .with_output("numbers", "more_numbers"),
            StepConfig::new("ZipTask")
                .with_input("left", "numbers")
                .with_input("right", "more_numbers")
                .with_output("pairs", "pairs"),
        ],
    );

    // Wiring is valid; only the read across two documents is refused
    let err = run(config).await.err().unwrap();
    match err {
        PipelineError::Step {
            step,
            source: AtomError::Storage(StorageError::MultiDocument(_, documents)),
            ..
        } => {
            assert_eq!(step, 2);
            assert_eq!(documents, vec!["SeriesTask", "SeriesTask-1"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
