//! Test: parameters are checked against the atom schema at assembly

use crate::helpers::*;
use mise::core::config::{PipelineConfig, StepConfig};
use mise::execution::Pipeline;
use mise::{ConfigValidationError, PipelineError};
use serde_json::json;

fn check(steps: Vec<StepConfig>) -> Result<Pipeline, PipelineError> {
    let config = PipelineConfig {
        name: "schema".into(),
        data_strategy: None,
        steps,
    };
    Pipeline::check(&config, &test_registry())
}

fn numbers() -> StepConfig {
    series(&[1])
}

fn divide() -> StepConfig {
    StepConfig::new("DivisibleByNTask")
        .with_input("to_divide", "numbers")
        .with_output("divisible", "divisible")
}

#[test]
fn test_defaults_fill_missing_params() {
    let pipeline = check(vec![numbers(), divide()]).unwrap();
    // Default task names are generated as <Atom>-<2 hex>
    let name = &pipeline.steps[1].task_name;
    assert!(name.starts_with("DivisibleByNTask-"), "got {name}");
    assert_eq!(name.len(), "DivisibleByNTask-".len() + 2);
}

#[test]
fn test_explicit_task_name_is_kept() {
    let pipeline = check(vec![
        numbers(),
        divide().with_param("task_name", json!("evens")),
    ])
    .unwrap();
    assert_eq!(pipeline.steps[1].task_name, "evens");
}

#[test]
fn test_unknown_parameter_lists_options() {
    let err = check(vec![numbers(), divide().with_param("m", json!(3))])
        .err()
        .unwrap();
    match err {
        PipelineError::Config(ConfigValidationError::UnknownParameter { key, options, .. }) => {
            assert_eq!(key, "m");
            assert!(options.contains(&"n".to_string()));
            assert!(options.contains(&"task_name".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_parameter_type_is_enforced() {
    let err = check(vec![numbers(), divide().with_param("n", json!("two"))])
        .err()
        .unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::ParameterType { ref key, .. }) if key == "n"
    ));
}

#[test]
fn test_required_parameter_is_enforced() {
    let filter = StepConfig::new("FilterBelowN").with_input("to_compare", "numbers");
    let err = check(vec![numbers(), filter]).err().unwrap();
    assert_eq!(
        err.to_string(),
        "Bad configuration for FilterBelowN: missing required parameter n:int"
    );
}

#[test]
fn test_validation_hook_rejects_zero_divisor() {
    let err = check(vec![numbers(), divide().with_param("n", json!(0))])
        .err()
        .unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::Validation { .. })
    ));
    assert!(err.to_string().contains("n cannot be zero"));
}

#[test]
fn test_base_layer_type_checked() {
    let err = check(vec![numbers().with_param("restricted", json!("yes"))])
        .err()
        .unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::ParameterType { ref key, .. }) if key == "restricted"
    ));
}

#[test]
fn test_return_from_unconfigured_output() {
    let step = StepConfig::new("SeriesTask")
        .with_param("values", json!([1]))
        .with_return("numbers", "numbers");
    let err = check(vec![step]).err().unwrap();
    assert!(matches!(
        err,
        PipelineError::Config(ConfigValidationError::ReturnFromUnconfiguredOutput { step: 0, .. })
    ));
}

#[test]
fn test_documentation_lists_inherited_fields() {
    let docs = test_registry().documentation();
    let doc = &docs["DivisibleByNTask"];
    assert_eq!(doc.params.get("n").map(String::as_str), Some("int"));
    assert_eq!(doc.defaults.get("n"), Some(&json!(2)));
    assert!(doc.params.contains_key("task_name"));
    assert!(doc.params.contains_key("restricted"));
    assert_eq!(doc.inputs.get("to_divide").map(String::as_str), Some("int"));
    assert!(docs["MostCommonTask"].creates_new_document);
}
