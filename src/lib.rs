//! mise - configuration-driven data pipelines with document storage and prefix caching

pub mod atom;
pub mod atoms;
pub mod cli;
pub mod core;
pub mod execution;
pub mod storage;

// Re-export commonly used types
pub use atom::{Atom, AtomInstance, AtomRegistry, AtomType, StepOutcome, TaskContext, TypeMetadata};
pub use crate::core::{
    AtomError, ConfigValidationError, ExecutionStatus, PipelineConfig, PipelineError, StepConfig,
    StepState, Table,
};
pub use execution::{run_pipeline, ExecutionEngine, ExecutionEvent, Pipeline, RunOutcome};
pub use storage::{CacheDirective, Collage, DataStrategy, StepStorage, StrategyRegistry};
