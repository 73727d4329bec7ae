//! Pipeline assembly: validate, set up storage, instantiate and wire steps

use crate::atom::{AtomInstance, AtomRegistry, AtomType, PortSchema, ValueType};
use crate::core::config::{PipelineConfig, StepConfig};
use crate::core::error::{ConfigValidationError, PipelineError};
use crate::core::state::{PipelineState, StepState};
use crate::storage::{CacheDirective, StrategyRegistry, NO_STRATEGY};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// One assembled step
pub struct PipelineStep {
    pub index: usize,
    /// Atom type name
    pub atom: String,
    pub task_name: String,
    pub cache: CacheDirective,
    pub state: StepState,
    instance: Option<AtomInstance>,
}

impl PipelineStep {
    /// Hand out the instance for its single call
    pub(crate) fn take_instance(&mut self) -> Option<AtomInstance> {
        self.instance.take()
    }
}

/// A fully validated pipeline, ready to run once
pub struct Pipeline {
    pub name: String,
    /// Data strategy in use
    pub strategy: String,
    /// Private run directory, when the strategy allocated one
    pub run_directory: Option<PathBuf>,
    /// Content hash up to the cache point, if one is configured
    pub cache_hash: Option<String>,
    pub steps: Vec<PipelineStep>,
    pub state: PipelineState,
}

impl Pipeline {
    /// Assemble a pipeline from its configuration.
    ///
    /// Order matters: atom metadata is resolved first, then every check
    /// that needs no storage runs, then the data strategy rewrites the
    /// configuration, and only then are atoms instantiated against it.
    pub fn assemble(
        mut config: PipelineConfig,
        atoms: &AtomRegistry,
        strategies: &StrategyRegistry,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut types: Vec<Arc<AtomType>> = Vec::with_capacity(config.steps.len());
        let mut output_types: Vec<PortSchema> = Vec::with_capacity(config.steps.len());
        for (index, step) in config.steps.iter_mut().enumerate() {
            let atom_type = atoms
                .get(&step.id)
                .ok_or_else(|| ConfigValidationError::UnknownAtom {
                    step: index,
                    atom: step.id.clone(),
                })?;
            step.new_document = atom_type.metadata().creates_new_document;
            let (schema, bindings) = atom_type.resolve_outputs(step)?;
            step.outputs = bindings;
            output_types.push(schema);
            types.push(atom_type);
        }

        validate_wiring(&config.steps, &types, &output_types)?;

        let strategy_name = config
            .data_strategy
            .as_ref()
            .map(|d| d.id.clone())
            .unwrap_or_else(|| NO_STRATEGY.to_string());
        let strategy = strategies
            .get(&strategy_name)
            .ok_or_else(|| ConfigValidationError::UnknownStrategy(strategy_name.clone()))?;
        strategy.setup_config(&mut config)?;

        let mut steps = Vec::with_capacity(config.steps.len());
        let bound = config.steps.iter().zip(types).zip(&output_types);
        for (index, ((step, atom_type), outputs)) in bound.enumerate() {
            let storage = match &step.storage {
                Some(descriptor) => Some(strategy.bind(descriptor, atom_type.inputs(), outputs)?),
                None => None,
            };
            let instance = AtomInstance::new(index, step, atom_type, storage)?;
            steps.push(PipelineStep {
                index,
                atom: step.id.clone(),
                task_name: instance.task_name().to_string(),
                cache: instance.cache(),
                state: StepState::Pending,
                instance: Some(instance),
            });
        }

        let descriptor = config.steps.iter().find_map(|s| s.storage.as_ref());
        let pipeline = Pipeline {
            name: config.name,
            strategy: strategy_name,
            run_directory: descriptor.map(|d| d.run_directory.clone()),
            cache_hash: descriptor.and_then(|d| d.cache_hash.clone()),
            steps,
            state: PipelineState::new(),
        };
        info!(
            "Assembled pipeline '{}' with {} steps ({})",
            pipeline.name,
            pipeline.steps.len(),
            pipeline.strategy
        );
        Ok(pipeline)
    }

    /// Validate a configuration without touching storage
    pub fn check(config: &PipelineConfig, atoms: &AtomRegistry) -> Result<Self, PipelineError> {
        let mut config = config.clone();
        config.validate()?;
        config.data_strategy = None;
        Self::assemble(config, atoms, &StrategyRegistry::with_builtin())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Cache directive per step, in order
    pub fn cache_plan(&self) -> Vec<CacheDirective> {
        self.steps.iter().map(|s| s.cache).collect()
    }
}

/// Forward-only wiring check.
///
/// Every input binding must be produced by a strictly earlier step with the
/// same declared type, unless the consuming port is the wildcard. Bindings
/// and return names must each be unique across the pipeline. `outputs` holds
/// each step's resolved output schema.
pub fn validate_wiring(
    steps: &[StepConfig],
    types: &[Arc<AtomType>],
    outputs: &[PortSchema],
) -> Result<(), ConfigValidationError> {
    let mut produced: HashMap<&str, ValueType> = HashMap::new();
    let mut returned: HashSet<&str> = HashSet::new();

    let resolved = steps.iter().zip(types).zip(outputs);
    for (index, ((step, atom_type), output_types)) in resolved.enumerate() {
        for (port, binding) in &step.inputs {
            let expected = atom_type.inputs().get(port).ok_or_else(|| {
                ConfigValidationError::UnknownPort {
                    step: index,
                    atom: step.id.clone(),
                    direction: "input",
                    port: port.clone(),
                }
            })?;
            let found = produced.get(binding.as_str()).ok_or_else(|| {
                ConfigValidationError::UnresolvedBinding {
                    step: index,
                    atom: step.id.clone(),
                    binding: binding.clone(),
                }
            })?;
            if !expected.is_wildcard() && expected != found {
                return Err(ConfigValidationError::PortTypeMismatch {
                    step: index,
                    atom: step.id.clone(),
                    binding: binding.clone(),
                    expected: expected.to_string(),
                    found: found.to_string(),
                });
            }
        }

        for (port, binding) in &step.outputs {
            let ty = output_types.get(port).ok_or_else(|| {
                ConfigValidationError::UnknownPort {
                    step: index,
                    atom: step.id.clone(),
                    direction: "output",
                    port: port.clone(),
                }
            })?;
            if produced.insert(binding.as_str(), *ty).is_some() {
                return Err(ConfigValidationError::DuplicateBinding {
                    step: index,
                    atom: step.id.clone(),
                    binding: binding.clone(),
                });
            }
        }

        for name in step.returns.values() {
            if !returned.insert(name.as_str()) {
                return Err(ConfigValidationError::DuplicateReturn {
                    step: index,
                    atom: step.id.clone(),
                    name: name.clone(),
                });
            }
        }
        debug!("Step {} ({}) wiring ok", index, step.id);
    }
    Ok(())
}
