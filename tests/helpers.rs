//! Test utility functions for mise

#![allow(dead_code)]

use async_trait::async_trait;
use mise::atom::{Atom, AtomRegistry, AtomType, FieldSpec, TaskContext, ValueType};
use mise::core::config::{DataStrategyConfig, PipelineConfig, StepConfig};
use mise::execution::{ExecutionEngine, ExecutionEvent, Pipeline, RunOutcome};
use mise::storage::csv_strategy::document_path;
use mise::storage::codec::read_document;
use mise::storage::StrategyRegistry;
use mise::{AtomError, PipelineError, Table};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Emits the `values` param as its `numbers` output, in a fresh document
struct Series {
    values: Vec<Value>,
}

#[async_trait]
impl Atom for Series {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        task.set_output("numbers", self.values.clone())?;
        Ok(())
    }
}

/// Reports that its query found nothing
struct FindNothing;

#[async_trait]
impl Atom for FindNothing {
    async fn task_body(&mut self, _task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        Err(AtomError::NoDiscovery("query produced no content".into()))
    }
}

/// Pairs up two equally long inputs
struct Zip;

#[async_trait]
impl Atom for Zip {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let pairs = task
            .input("left")?
            .iter()
            .zip(task.input("right")?)
            .map(|(l, r)| json!([l, r]))
            .collect();
        task.set_output("pairs", pairs)?;
        Ok(())
    }
}

/// Built-in atoms plus deterministic test atoms
pub fn test_registry() -> AtomRegistry {
    let mut registry = AtomRegistry::with_builtin();
    registry.register(
        AtomType::builder("SeriesTask")
            .describe("Emit a fixed list of numbers")
            .param(FieldSpec::required("values", ValueType::List))
            .output("numbers", ValueType::Int)
            .new_document()
            .build(|params| {
                Ok(Box::new(Series {
                    values: params.list("values")?.to_vec(),
                }))
            }),
    );
    registry.register(
        AtomType::builder("FindNothingTask")
            .input("to_search", ValueType::Any)
            .build(|_| Ok(Box::new(FindNothing))),
    );
    registry.register(
        AtomType::builder("ZipTask")
            .input("left", ValueType::Int)
            .input("right", ValueType::Int)
            .output("pairs", ValueType::List)
            .build(|_| Ok(Box::new(Zip))),
    );
    registry
}

pub fn series(values: &[i64]) -> StepConfig {
    StepConfig::new("SeriesTask")
        .with_param("values", json!(values))
        .with_output("numbers", "numbers")
}

/// A pipeline stored under `root` with the CSV document strategy
pub fn csv_pipeline(name: &str, root: &Path, steps: Vec<StepConfig>) -> PipelineConfig {
    PipelineConfig {
        name: name.to_string(),
        data_strategy: Some(DataStrategyConfig::new("PandasStrategy", root)),
        steps,
    }
}

pub fn assemble(config: PipelineConfig) -> Result<Pipeline, PipelineError> {
    Pipeline::assemble(config, &test_registry(), &StrategyRegistry::with_builtin())
}

/// Result of running a pipeline, plus every event it emitted
pub struct PipelineTestResult {
    pub pipeline: Pipeline,
    pub outcome: RunOutcome,
    pub events: Vec<ExecutionEvent>,
}

impl PipelineTestResult {
    /// Read a document back from this run's directory
    pub fn document(&self, name: &str) -> Table {
        let directory = self
            .pipeline
            .run_directory
            .as_deref()
            .expect("pipeline has no run directory");
        read_document(&document_path(directory, name))
            .unwrap_or_else(|e| panic!("Failed to read document {}: {}", name, e))
    }

    pub fn returned(&self, name: &str) -> &[Value] {
        self.outcome
            .returns
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_else(|| panic!("'{}' was not returned", name))
    }
}

/// Assemble and run a pipeline, recording events
pub async fn run(config: PipelineConfig) -> Result<PipelineTestResult, PipelineError> {
    let mut pipeline = assemble(config)?;

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let engine = ExecutionEngine::new();
    engine
        .add_event_handler(move |event| {
            if let Ok(mut events) = sink.lock() {
                events.push(event);
            }
        })
        .await;

    let outcome = engine.execute(&mut pipeline).await?;
    let events = events.lock().map(|e| e.clone()).unwrap_or_default();
    Ok(PipelineTestResult {
        pipeline,
        outcome,
        events,
    })
}

/// Number of run directories created under `root` for `name`
pub fn run_directories(root: &Path, name: &str) -> usize {
    let prefix = format!("{}-", name);
    std::fs::read_dir(root)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|e| e.path().is_dir())
                .filter(|e| e.file_name().to_string_lossy().starts_with(&prefix))
                .count()
        })
        .unwrap_or(0)
}
