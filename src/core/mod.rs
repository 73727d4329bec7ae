//! Core domain models
//!
//! Configuration, errors, the tabular value model and execution state.

pub mod config;
pub mod error;
pub mod state;
pub mod table;

pub use config::{DataStrategyConfig, PipelineConfig, PortMap, StepConfig};
pub use error::{AtomError, CollageError, ConfigValidationError, PipelineError, StorageError};
pub use state::{ExecutionStatus, PipelineState, StepState};
pub use table::Table;
