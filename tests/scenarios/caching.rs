//! Test: prefix caching across runs of the same pipeline

use crate::helpers::*;
use mise::core::config::{PipelineConfig, StepConfig};
use mise::core::StepState;
use mise::execution::ExecutionEvent;
use mise::storage::CacheDirective;
use mise::{ConfigValidationError, ExecutionStatus, PipelineError};
use serde_json::json;
use std::path::Path;

fn cached_pipeline(root: &Path, values: &[i64]) -> PipelineConfig {
    csv_pipeline(
        "cached",
        root,
        vec![
            series(values),
            StepConfig::new("ListPrimeFactorsTask")
                .with_input("to_factor", "numbers")
                .with_output("factors", "factors")
                .with_return("factors", "factors")
                .cache_point(),
            StepConfig::new("PrintFieldTask").with_input("to_print", "factors"),
        ],
    )
}

#[tokio::test]
async fn test_first_run_saves_second_run_loads() {
    let root = tempfile::tempdir().unwrap();

    let first = run(cached_pipeline(root.path(), &[12, 7, 30])).await.unwrap();
    assert_eq!(
        first.pipeline.cache_plan(),
        vec![CacheDirective::None, CacheDirective::Save, CacheDirective::None]
    );
    assert_eq!(first.outcome.status, ExecutionStatus::Completed);
    assert_eq!(
        first.returned("factors"),
        &[json!([2, 3, 4, 6]), json!([]), json!([2, 3, 5, 6, 10, 15])]
    );
    assert!(root.path().join("cached-meta.json").exists());

    let second = run(cached_pipeline(root.path(), &[12, 7, 30])).await.unwrap();
    assert_eq!(second.pipeline.cache_hash, first.pipeline.cache_hash);
    assert_eq!(
        second.pipeline.cache_plan(),
        vec![CacheDirective::Skip, CacheDirective::Load, CacheDirective::None]
    );
    assert_eq!(second.outcome.status, ExecutionStatus::Completed);
    assert_eq!(second.returned("factors"), first.returned("factors"));
    assert!(matches!(second.pipeline.steps[0].state, StepState::Skipped { .. }));
    assert!(second
        .events
        .iter()
        .any(|e| matches!(e, ExecutionEvent::StepSkipped { index: 0, .. })));

    // Each run still gets its own directory
    assert_ne!(first.pipeline.run_directory, second.pipeline.run_directory);
    assert_eq!(run_directories(root.path(), "cached"), 2);
    assert_eq!(second.document("SeriesTask").row_count(), 3);
}

#[tokio::test]
async fn test_changed_params_miss_the_cache() {
    let root = tempfile::tempdir().unwrap();

    let first = run(cached_pipeline(root.path(), &[12, 7])).await.unwrap();
    let second = run(cached_pipeline(root.path(), &[12, 8])).await.unwrap();

    assert_ne!(first.pipeline.cache_hash, second.pipeline.cache_hash);
    assert_eq!(second.pipeline.cache_plan()[1], CacheDirective::Save);
    assert_eq!(second.returned("factors"), &[json!([2, 3, 4, 6]), json!([2, 4])]);
}

#[tokio::test]
async fn test_steps_after_cache_point_do_not_affect_hash() {
    let root = tempfile::tempdir().unwrap();

    let first = run(cached_pipeline(root.path(), &[6])).await.unwrap();

    let mut config = cached_pipeline(root.path(), &[6]);
    config.steps[2] = StepConfig::new("CountItemsTask")
        .with_input("to_count", "factors")
        .with_output("counted", "counted")
        .with_return("counted", "counted");
    let second = run(config).await.unwrap();

    assert_eq!(first.pipeline.cache_hash, second.pipeline.cache_hash);
    assert_eq!(second.pipeline.cache_plan()[1], CacheDirective::Load);
    assert_eq!(second.returned("counted"), &[json!(2)]);
}

#[tokio::test]
async fn test_removed_cached_output_runs_without_cache() {
    let root = tempfile::tempdir().unwrap();

    let first = run(cached_pipeline(root.path(), &[10])).await.unwrap();
    let first_directory = first.pipeline.run_directory.clone().unwrap();
    std::fs::remove_dir_all(&first_directory).unwrap();

    let second = run(cached_pipeline(root.path(), &[10])).await.unwrap();
    assert_eq!(second.pipeline.cache_plan()[0], CacheDirective::None);
    assert_eq!(second.pipeline.cache_plan()[1], CacheDirective::Save);
    assert_eq!(second.returned("factors"), &[json!([2, 5])]);
}

#[tokio::test]
async fn test_multiple_cache_points_create_nothing() {
    let root = tempfile::tempdir().unwrap();
    let data = root.path().join("data");

    let mut config = cached_pipeline(&data, &[1, 2]);
    config.steps[0] = series(&[1, 2]).cache_point();

    let err = assemble(config).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::MultipleCachePoints { first: 0, second: 1 })
    ));
    assert!(!data.exists());
}

#[tokio::test]
async fn test_without_cache_point_nothing_is_registered() {
    let root = tempfile::tempdir().unwrap();

    let mut config = cached_pipeline(root.path(), &[4]);
    config.steps[1].load_if_cached = false;
    let result = run(config).await.unwrap();

    assert!(result.pipeline.cache_hash.is_none());
    assert!(result
        .pipeline
        .cache_plan()
        .iter()
        .all(|d| *d == CacheDirective::None));
}

#[tokio::test]
async fn test_new_document_cache_point_reads_inputs_from_cached_run() {
    let root = tempfile::tempdir().unwrap();
    let config = || {
        csv_pipeline(
            "top-cached",
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
                    .with_return("top_elements", "top")
                    .cache_point(),
            ],
        )
    };

    let first = run(config()).await.unwrap();
    assert_eq!(first.returned("top"), &[json!(2), json!(3)]);

    let second = run(config()).await.unwrap();
    assert_eq!(
        second.pipeline.cache_plan(),
        vec![CacheDirective::Skip, CacheDirective::Skip, CacheDirective::Load]
    );
    assert_eq!(second.outcome.status, ExecutionStatus::Completed);
    assert_eq!(second.returned("top"), first.returned("top"));
    assert_eq!(second.document("MostCommonTask").row_count(), 2);
}
