//! Pipeline assembly and execution

pub mod engine;
pub mod pipeline;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, RunOutcome};
pub use pipeline::{validate_wiring, Pipeline, PipelineStep};

use crate::atom::AtomRegistry;
use crate::core::config::PipelineConfig;
use crate::core::error::PipelineError;
use crate::storage::StrategyRegistry;

/// Assemble and run a pipeline with a fresh engine
pub async fn run_pipeline(
    config: PipelineConfig,
    atoms: &AtomRegistry,
    strategies: &StrategyRegistry,
) -> Result<RunOutcome, PipelineError> {
    let mut pipeline = Pipeline::assemble(config, atoms, strategies)?;
    ExecutionEngine::new().execute(&mut pipeline).await
}
