//! Parameter and port schemas
//!
//! An atom's parameter schema is a stack of [`SchemaLayer`]s, base first.
//! Layers are merged once at registration time into a flat [`ParamSchema`];
//! when two layers declare the same field the more specific one wins.

use crate::core::error::ConfigValidationError;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Date format accepted by [`ValueType::Date`]
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Static type tag for parameters and ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Int,
    Float,
    Bool,
    List,
    Map,
    /// A `YYYY-MM-DD` string
    Date,
    /// Wildcard: accepts any value. On a port, disables type checking.
    Any,
}

impl ValueType {
    /// Check whether a value conforms to this type
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ValueType::String => value.is_string(),
            ValueType::Int => value.is_i64() || value.is_u64(),
            ValueType::Float => value.is_f64(),
            ValueType::Bool => value.is_boolean(),
            ValueType::List => value.is_array(),
            ValueType::Map => value.is_object(),
            ValueType::Date => value
                .as_str()
                .map(|s| NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok())
                .unwrap_or(false),
            ValueType::Any => true,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, ValueType::Any)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Bool => "bool",
            ValueType::List => "list",
            ValueType::Map => "map",
            ValueType::Date => "date",
            ValueType::Any => "any",
        }
    }

    /// Name of the runtime type of a JSON value, for error messages
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(n) if n.is_f64() => "float",
            Value::Number(_) => "int",
            Value::String(_) => "string",
            Value::Array(_) => "list",
            Value::Object(_) => "map",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" | "str" => Ok(ValueType::String),
            "int" => Ok(ValueType::Int),
            "float" => Ok(ValueType::Float),
            "bool" => Ok(ValueType::Bool),
            "list" => Ok(ValueType::List),
            "map" | "dict" => Ok(ValueType::Map),
            "date" => Ok(ValueType::Date),
            "any" => Ok(ValueType::Any),
            other => Err(format!("unknown type '{}'", other)),
        }
    }
}

/// Port name -> declared value type
pub type PortSchema = IndexMap<String, ValueType>;

/// Fine-grained check run after type validation, e.g. range checks
pub type ValidateHook = fn(&Params) -> Result<(), String>;

/// One declared parameter
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: ValueType,
    pub default: Option<Value>,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, ty: ValueType, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default),
        }
    }

    /// A field that defaults to null when unset
    pub fn optional(name: impl Into<String>, ty: ValueType) -> Self {
        Self::with_default(name, ty, Value::Null)
    }
}

/// The fields and validation hook contributed by one level of an atom's
/// ancestry
#[derive(Debug, Clone)]
pub struct SchemaLayer {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    pub validate: Option<ValidateHook>,
}

impl SchemaLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            validate: None,
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn validate(mut self, hook: ValidateHook) -> Self {
        self.validate = Some(hook);
        self
    }

    /// Layer shared by every atom
    pub fn base() -> Self {
        SchemaLayer::new("FlowAtom")
            .field(FieldSpec::with_default(
                "task_name",
                ValueType::String,
                Value::String(DEFAULT_TASK_NAME.to_string()),
            ))
            .field(FieldSpec::with_default(
                "restricted",
                ValueType::Bool,
                Value::Bool(false),
            ))
    }
}

/// Placeholder task name replaced by a generated one at instantiation
pub const DEFAULT_TASK_NAME: &str = "default";

/// Flattened parameter schema
#[derive(Debug, Clone, Default)]
pub struct ParamSchema {
    fields: IndexMap<String, FieldSpec>,
}

impl ParamSchema {
    /// Merge layers given base first. A field redeclared by a more specific
    /// layer replaces the inherited one but keeps its original position.
    pub fn from_layers(layers: &[SchemaLayer]) -> Self {
        let mut fields: IndexMap<String, FieldSpec> = IndexMap::new();
        for layer in layers {
            for field in &layer.fields {
                fields.insert(field.name.clone(), field.clone());
            }
        }
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Check supplied values against the schema and fill in defaults
    pub fn bind(
        &self,
        atom: &str,
        supplied: &IndexMap<String, Value>,
    ) -> Result<Params, ConfigValidationError> {
        for (key, value) in supplied {
            let field = self
                .fields
                .get(key)
                .ok_or_else(|| ConfigValidationError::UnknownParameter {
                    atom: atom.to_string(),
                    key: key.clone(),
                    options: self.fields.keys().cloned().collect(),
                })?;
            if !field.ty.matches(value) {
                return Err(ConfigValidationError::ParameterType {
                    atom: atom.to_string(),
                    key: key.clone(),
                    expected: field.ty.to_string(),
                    found: ValueType::describe(value).to_string(),
                });
            }
        }

        let mut values = IndexMap::new();
        for (name, field) in &self.fields {
            let value = match (supplied.get(name), &field.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) => {
                    return Err(ConfigValidationError::MissingParameter {
                        atom: atom.to_string(),
                        key: name.clone(),
                        expected: field.ty.to_string(),
                    })
                }
            };
            values.insert(name.clone(), value);
        }
        Ok(Params { values })
    }
}

/// Validated parameter values for one atom instance
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Params {
    values: IndexMap<String, Value>,
}

impl Params {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    fn require(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| anyhow!("parameter '{}' is not declared", key))
    }

    pub fn str(&self, key: &str) -> Result<&str> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| anyhow!("parameter '{}' is not a string", key))
    }

    pub fn int(&self, key: &str) -> Result<i64> {
        self.require(key)?
            .as_i64()
            .ok_or_else(|| anyhow!("parameter '{}' is not an int", key))
    }

    pub fn float(&self, key: &str) -> Result<f64> {
        self.require(key)?
            .as_f64()
            .ok_or_else(|| anyhow!("parameter '{}' is not a number", key))
    }

    pub fn bool(&self, key: &str) -> Result<bool> {
        self.require(key)?
            .as_bool()
            .ok_or_else(|| anyhow!("parameter '{}' is not a bool", key))
    }

    pub fn list(&self, key: &str) -> Result<&[Value]> {
        self.require(key)?
            .as_array()
            .map(Vec::as_slice)
            .ok_or_else(|| anyhow!("parameter '{}' is not a list", key))
    }

    pub fn date(&self, key: &str) -> Result<NaiveDate> {
        let raw = self.str(key)?;
        NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map_err(|e| anyhow!("parameter '{}' is not a date: {}", key, e))
    }
}
