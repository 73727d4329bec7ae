//! Atoms: schema-validated processing steps
//!
//! An atom is described in two halves. [`AtomType`] is the static half: its
//! parameter schema, port schemas and whether it starts a new document. It
//! can be queried before any storage exists. [`AtomInstance`] is the bound
//! half, created once storage has been set up and called exactly once.

pub mod instance;
pub mod registry;
pub mod schema;

pub use instance::{AtomInstance, StepOutcome};
pub use registry::{AtomDoc, AtomRegistry};
pub use schema::{
    FieldSpec, ParamSchema, Params, PortSchema, SchemaLayer, ValidateHook, ValueType,
    DATE_FORMAT, DEFAULT_TASK_NAME,
};

use crate::core::config::{PortMap, StepConfig};
use crate::core::error::{AtomError, ConfigValidationError, StorageError};
use crate::core::table::Table;
use crate::storage::StepStorage;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Output binding that expands to one output per configured column
pub const CONFIGURED_OUTPUTS: &str = "configured__";

/// Business logic of an atom.
///
/// `task.data` holds one column per input port, and `task.results` one
/// placeholder column per output port for the atom to fill in.
#[async_trait]
pub trait Atom: Send {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError>;
}

/// Builds the business-logic half of an atom from validated params
pub type AtomFactory = Arc<dyn Fn(&Params) -> anyhow::Result<Box<dyn Atom>> + Send + Sync>;

/// Instance-free capabilities of an atom type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeMetadata {
    pub name: String,
    pub creates_new_document: bool,
}

/// A registered atom type
pub struct AtomType {
    name: String,
    description: String,
    layers: Vec<SchemaLayer>,
    schema: ParamSchema,
    inputs: PortSchema,
    outputs: PortSchema,
    /// Param holding a `{column: type}` map that replaces `outputs`
    configured_outputs: Option<String>,
    creates_new_document: bool,
    factory: AtomFactory,
}

impl AtomType {
    pub fn builder(name: impl Into<String>) -> AtomTypeBuilder {
        let name = name.into();
        AtomTypeBuilder {
            own: SchemaLayer::new(name.clone()),
            name,
            description: String::new(),
            ancestors: Vec::new(),
            inputs: PortSchema::new(),
            outputs: PortSchema::new(),
            configured_outputs: None,
            creates_new_document: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Schema layers, base first
    pub fn layers(&self) -> &[SchemaLayer] {
        &self.layers
    }

    pub fn schema(&self) -> &ParamSchema {
        &self.schema
    }

    pub fn inputs(&self) -> &PortSchema {
        &self.inputs
    }

    pub fn outputs(&self) -> &PortSchema {
        &self.outputs
    }

    /// Name of the param that configures this atom's outputs, if any
    pub fn configured_outputs(&self) -> Option<&str> {
        self.configured_outputs.as_deref()
    }

    pub fn creates_new_document(&self) -> bool {
        self.creates_new_document
    }

    /// Output schema and output bindings of one step.
    ///
    /// For atoms with configured outputs the schema comes from the step's
    /// columns param, and a [`CONFIGURED_OUTPUTS`] binding expands to one
    /// identity binding per column. Other atoms return their static schema
    /// and the step's bindings untouched.
    pub fn resolve_outputs(
        &self,
        step: &StepConfig,
    ) -> Result<(PortSchema, PortMap), ConfigValidationError> {
        let Some(param) = &self.configured_outputs else {
            return Ok((self.outputs.clone(), step.outputs.clone()));
        };
        let columns = match step.params.get(param) {
            Some(Value::Object(columns)) => columns,
            Some(other) => {
                return Err(ConfigValidationError::ParameterType {
                    atom: self.name.clone(),
                    key: param.clone(),
                    expected: ValueType::Map.to_string(),
                    found: ValueType::describe(other).to_string(),
                })
            }
            None => {
                return Err(ConfigValidationError::MissingParameter {
                    atom: self.name.clone(),
                    key: param.clone(),
                    expected: ValueType::Map.to_string(),
                })
            }
        };

        let mut schema = PortSchema::new();
        for (column, ty) in columns {
            let ty = ty
                .as_str()
                .ok_or_else(|| format!("type of column '{}' must be a string", column))
                .and_then(|name| name.parse::<ValueType>())
                .map_err(|message| ConfigValidationError::Validation {
                    atom: self.name.clone(),
                    message,
                })?;
            schema.insert(column.clone(), ty);
        }

        let mut bindings = step.outputs.clone();
        if bindings.shift_remove(CONFIGURED_OUTPUTS).is_some() {
            for column in schema.keys() {
                bindings
                    .entry(column.clone())
                    .or_insert_with(|| column.clone());
            }
        }
        Ok((schema, bindings))
    }

    pub fn metadata(&self) -> TypeMetadata {
        TypeMetadata {
            name: self.name.clone(),
            creates_new_document: self.creates_new_document,
        }
    }

    pub(crate) fn instantiate(&self, params: &Params) -> anyhow::Result<Box<dyn Atom>> {
        (self.factory)(params)
    }
}

impl fmt::Debug for AtomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AtomType")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("configured_outputs", &self.configured_outputs)
            .field("creates_new_document", &self.creates_new_document)
            .finish()
    }
}

/// Builder for [`AtomType`]
pub struct AtomTypeBuilder {
    name: String,
    description: String,
    ancestors: Vec<SchemaLayer>,
    own: SchemaLayer,
    inputs: PortSchema,
    outputs: PortSchema,
    configured_outputs: Option<String>,
    creates_new_document: bool,
}

impl AtomTypeBuilder {
    /// Help text shown by the `atoms` command
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = text.into();
        self
    }

    /// Inherit an intermediate layer. Call in order from the most general
    /// ancestor to the most specific; the shared base layer is implicit.
    pub fn extends(mut self, layer: SchemaLayer) -> Self {
        self.ancestors.push(layer);
        self
    }

    pub fn param(mut self, field: FieldSpec) -> Self {
        self.own = self.own.field(field);
        self
    }

    pub fn validate(mut self, hook: ValidateHook) -> Self {
        self.own = self.own.validate(hook);
        self
    }

    pub fn input(mut self, port: impl Into<String>, ty: ValueType) -> Self {
        self.inputs.insert(port.into(), ty);
        self
    }

    pub fn output(mut self, port: impl Into<String>, ty: ValueType) -> Self {
        self.outputs.insert(port.into(), ty);
        self
    }

    /// Take output ports from a `{column: type}` map param instead of
    /// declared outputs
    pub fn configured_outputs(mut self, param: impl Into<String>) -> Self {
        self.configured_outputs = Some(param.into());
        self
    }

    pub fn new_document(mut self) -> Self {
        self.creates_new_document = true;
        self
    }

    pub fn build<F>(self, factory: F) -> AtomType
    where
        F: Fn(&Params) -> anyhow::Result<Box<dyn Atom>> + Send + Sync + 'static,
    {
        let mut layers = Vec::with_capacity(self.ancestors.len() + 2);
        layers.push(SchemaLayer::base());
        layers.extend(self.ancestors);
        layers.push(self.own);
        let schema = ParamSchema::from_layers(&layers);

        AtomType {
            name: self.name,
            description: self.description,
            layers,
            schema,
            inputs: self.inputs,
            outputs: self.outputs,
            configured_outputs: self.configured_outputs,
            creates_new_document: self.creates_new_document,
            factory: Arc::new(factory),
        }
    }
}

/// What an atom sees while its business logic runs
pub struct TaskContext<'a> {
    pub params: &'a Params,
    pub task_name: &'a str,
    /// One column per input port
    pub data: Table,
    /// One column per output port, filled in by the atom
    pub results: Table,
    storage: Option<&'a mut (dyn StepStorage + 'static)>,
}

impl<'a> TaskContext<'a> {
    pub fn new(
        params: &'a Params,
        task_name: &'a str,
        data: Table,
        results: Table,
        storage: Option<&'a mut (dyn StepStorage + 'static)>,
    ) -> Self {
        Self {
            params,
            task_name,
            data,
            results,
            storage,
        }
    }

    /// Values of an input port
    pub fn input(&self, port: &str) -> Result<&[Value], StorageError> {
        self.data
            .column(port)
            .ok_or_else(|| StorageError::MissingColumn(port.to_string()))
    }

    /// Fill an output port
    pub fn set_output(&mut self, port: &str, values: Vec<Value>) -> Result<(), StorageError> {
        if !self.results.has_column(port) {
            return Err(StorageError::MissingColumn(port.to_string()));
        }
        self.results.set_column(port, values)?;
        Ok(())
    }

    pub fn apply_filter(&mut self, keep: &[bool]) -> Result<(), StorageError> {
        self.storage
            .as_deref_mut()
            .ok_or(StorageError::Unbound("apply_filter"))?
            .apply_filter(keep)
    }

    pub fn get_columns(&mut self, columns: &[&str]) -> Result<Table, StorageError> {
        self.storage
            .as_deref_mut()
            .ok_or(StorageError::Unbound("get_columns"))?
            .get_columns(columns)
    }
}
