//! The strategy used when a pipeline configures no storage

use super::{DataStrategy, StepStorage, StorageDescriptor};
use crate::atom::PortSchema;
use crate::core::config::PipelineConfig;
use crate::core::error::{PipelineError, StorageError};

/// Attaches no storage to any step. Atoms run, but every storage accessor
/// fails with [`StorageError::Unbound`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoStrategy;

impl DataStrategy for NoStrategy {
    fn setup_config(&self, config: &mut PipelineConfig) -> Result<(), PipelineError> {
        for step in &mut config.steps {
            step.storage = None;
        }
        Ok(())
    }

    fn bind(
        &self,
        _descriptor: &StorageDescriptor,
        _inputs: &PortSchema,
        _outputs: &PortSchema,
    ) -> Result<Box<dyn StepStorage>, StorageError> {
        Err(StorageError::Unbound("bind"))
    }
}
