//! Bound, call-once atom instances

use super::{Atom, AtomType, Params, PortSchema, TaskContext, DEFAULT_TASK_NAME};
use crate::core::config::{PortMap, StepConfig};
use crate::core::error::{AtomError, ConfigValidationError, StorageError};
use crate::core::table::Table;
use crate::storage::{CacheDirective, StepStorage};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Result of calling an atom instance
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// A later step loads from cache, so this one did nothing
    Skipped,
    Completed {
        /// Return name -> the returned output column
        returns: IndexMap<String, Value>,
        restricted: bool,
    },
}

/// One configured step, validated and bound to its storage
pub struct AtomInstance {
    index: usize,
    atom_type: Arc<AtomType>,
    params: Params,
    task_name: String,
    restricted: bool,
    inputs: PortMap,
    outputs: PortMap,
    output_types: PortSchema,
    returns: PortMap,
    cache: CacheDirective,
    storage: Option<Box<dyn StepStorage>>,
    atom: Box<dyn Atom>,
}

impl AtomInstance {
    /// Validate a step against its atom type and bind it.
    ///
    /// Checks port names, binds and type-checks parameters, runs every
    /// layer's validation hook from the base layer down, and checks that
    /// every returned port is a configured output.
    pub fn new(
        index: usize,
        step: &StepConfig,
        atom_type: Arc<AtomType>,
        storage: Option<Box<dyn StepStorage>>,
    ) -> Result<Self, ConfigValidationError> {
        let name = atom_type.name().to_string();
        let (output_types, outputs) = atom_type.resolve_outputs(step)?;
        check_ports(index, step, &atom_type, &output_types, &outputs)?;

        let mut params = atom_type.schema().bind(&name, &step.params)?;
        for layer in atom_type.layers() {
            if let Some(hook) = layer.validate {
                hook(&params).map_err(|message| ConfigValidationError::Validation {
                    atom: name.clone(),
                    message,
                })?;
            }
        }

        let task_name = match params.get("task_name").and_then(Value::as_str) {
            Some(configured) if configured != DEFAULT_TASK_NAME => configured.to_string(),
            _ => format!("{}-{}", name, &Uuid::new_v4().simple().to_string()[..2]),
        };
        params.insert("task_name", Value::String(task_name.clone()));
        let restricted = params
            .get("restricted")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let atom = atom_type
            .instantiate(&params)
            .map_err(|e| ConfigValidationError::Validation {
                atom: name.clone(),
                message: e.to_string(),
            })?;

        let cache = step
            .storage
            .as_ref()
            .map(|descriptor| descriptor.cache)
            .unwrap_or_default();

        debug!("Instantiated step {} as {}", index, task_name);
        Ok(Self {
            index,
            atom_type,
            params,
            task_name,
            restricted,
            inputs: step.inputs.clone(),
            outputs,
            output_types,
            returns: step.returns.clone(),
            cache,
            storage,
            atom,
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn atom_type(&self) -> &AtomType {
        &self.atom_type
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn restricted(&self) -> bool {
        self.restricted
    }

    pub fn cache(&self) -> CacheDirective {
        self.cache
    }

    /// Configured input port -> binding
    pub fn inputs(&self) -> &PortMap {
        &self.inputs
    }

    /// Configured output port -> binding
    pub fn outputs(&self) -> &PortMap {
        &self.outputs
    }

    /// Output port -> return name
    pub fn returns(&self) -> &PortMap {
        &self.returns
    }

    pub fn get_data(&mut self, cache: bool) -> Result<(Table, Table), StorageError> {
        self.storage_mut("get_data")?.get_data(cache)
    }

    pub fn write_data(&mut self, results: &Table, cache: bool) -> Result<(), StorageError> {
        self.storage_mut("write_data")?.write_data(results, cache)
    }

    pub fn apply_filter(&mut self, keep: &[bool]) -> Result<(), StorageError> {
        self.storage_mut("apply_filter")?.apply_filter(keep)
    }

    pub fn get_columns(&mut self, columns: &[&str]) -> Result<Table, StorageError> {
        self.storage_mut("get_columns")?.get_columns(columns)
    }

    fn storage_mut(
        &mut self,
        action: &'static str,
    ) -> Result<&mut (dyn StepStorage + 'static), StorageError> {
        self.storage
            .as_deref_mut()
            .ok_or(StorageError::Unbound(action))
    }

    /// Run the step: load inputs, run the business logic, persist outputs.
    /// Consumes the instance.
    pub async fn call(mut self) -> Result<StepOutcome, AtomError> {
        if self.cache == CacheDirective::Skip {
            info!("Skipping {} due to cache settings", self.task_name);
            return Ok(StepOutcome::Skipped);
        }

        let (data, results) = if self.inputs.is_empty() {
            let results = Table::with_columns(self.output_types.keys().cloned());
            (Table::new(), results)
        } else {
            self.get_data(self.cache == CacheDirective::Load)?
        };

        let mut task = TaskContext::new(
            &self.params,
            &self.task_name,
            data,
            results,
            self.storage.as_deref_mut(),
        );
        self.atom.task_body(&mut task).await?;
        let results = task.results;

        let mut returns = IndexMap::new();
        if !self.outputs.is_empty() {
            for (port, name) in &self.returns {
                let column = results.column(port).map(<[Value]>::to_vec).unwrap_or_default();
                returns.insert(name.clone(), Value::Array(column));
            }
            let save = self.cache == CacheDirective::Save;
            self.write_data(&results, save)?;
        }

        Ok(StepOutcome::Completed {
            returns,
            restricted: self.restricted,
        })
    }
}

fn check_ports(
    index: usize,
    step: &StepConfig,
    atom_type: &AtomType,
    output_types: &PortSchema,
    outputs: &PortMap,
) -> Result<(), ConfigValidationError> {
    let unknown = |direction: &'static str, port: &String| ConfigValidationError::UnknownPort {
        step: index,
        atom: atom_type.name().to_string(),
        direction,
        port: port.clone(),
    };

    if let Some(port) = step.inputs.keys().find(|p| !atom_type.inputs().contains_key(*p)) {
        return Err(unknown("input", port));
    }
    if let Some(port) = atom_type.inputs().keys().find(|p| !step.inputs.contains_key(*p)) {
        return Err(ConfigValidationError::MissingPort {
            step: index,
            atom: atom_type.name().to_string(),
            port: port.clone(),
        });
    }
    if let Some(port) = outputs.keys().find(|p| !output_types.contains_key(*p)) {
        return Err(unknown("output", port));
    }
    if let Some(port) = step.returns.keys().find(|p| !outputs.contains_key(*p)) {
        return Err(ConfigValidationError::ReturnFromUnconfiguredOutput {
            step: index,
            atom: atom_type.name().to_string(),
            port: port.clone(),
        });
    }
    Ok(())
}
