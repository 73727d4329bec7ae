//! Pipeline configuration from YAML or JSON

use crate::core::error::ConfigValidationError;
use crate::storage::StorageDescriptor;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Port name -> pipeline-global binding name
pub type PortMap = IndexMap<String, String>;

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name, also used to name run directories
    #[serde(default = "default_pipeline_name")]
    pub name: String,

    /// Storage strategy shared by every step (absent = no storage)
    #[serde(default)]
    pub data_strategy: Option<DataStrategyConfig>,

    /// Ordered pipeline steps
    pub steps: Vec<StepConfig>,
}

/// Data strategy descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataStrategyConfig {
    /// Registered strategy name
    pub id: String,

    /// Root directory for run directories and the cache index
    #[serde(default = "default_data_location")]
    pub data_location: PathBuf,

    /// Strategy-specific extras
    #[serde(flatten)]
    pub extra: IndexMap<String, Value>,
}

/// A single step as written in the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    /// Registered atom name
    pub id: String,

    /// Parameter values, validated against the atom schema
    #[serde(default)]
    pub params: IndexMap<String, Value>,

    /// Input port -> binding
    #[serde(default)]
    pub inputs: PortMap,

    /// Output port -> binding
    #[serde(default)]
    pub outputs: PortMap,

    /// Output port -> name under which the column is handed back to the caller
    #[serde(default)]
    pub returns: PortMap,

    /// Marks this step as the pipeline's cache point
    #[serde(default)]
    pub load_if_cached: bool,

    /// Filled in by the assembler's metadata pre-pass
    #[serde(skip)]
    pub new_document: bool,

    /// Filled in by the data strategy during setup
    #[serde(skip)]
    pub storage: Option<StorageDescriptor>,
}

fn default_pipeline_name() -> String {
    "unnamed".to_string()
}

fn default_data_location() -> PathBuf {
    PathBuf::from("data/")
}

impl StepConfig {
    /// Create a step with no params or ports
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            params: IndexMap::new(),
            inputs: PortMap::new(),
            outputs: PortMap::new(),
            returns: PortMap::new(),
            load_if_cached: false,
            new_document: false,
            storage: None,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_input(mut self, port: impl Into<String>, binding: impl Into<String>) -> Self {
        self.inputs.insert(port.into(), binding.into());
        self
    }

    pub fn with_output(mut self, port: impl Into<String>, binding: impl Into<String>) -> Self {
        self.outputs.insert(port.into(), binding.into());
        self
    }

    pub fn with_return(mut self, port: impl Into<String>, name: impl Into<String>) -> Self {
        self.returns.insert(port.into(), name.into());
        self
    }

    pub fn cache_point(mut self) -> Self {
        self.load_if_cached = true;
        self
    }
}

impl DataStrategyConfig {
    pub fn new(id: impl Into<String>, data_location: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            data_location: data_location.into(),
            extra: IndexMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration file; `.json` files are read as JSON, anything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        let config = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_yaml(&content)?
        };
        Ok(config)
    }

    /// Parse pipeline configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigValidationError> {
        let raw: Value =
            serde_yaml::from_str(yaml).map_err(|e| ConfigValidationError::Parse(e.to_string()))?;
        Self::from_value(raw)
    }

    /// Parse pipeline configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigValidationError> {
        let raw: Value =
            serde_json::from_str(json).map_err(|e| ConfigValidationError::Parse(e.to_string()))?;
        Self::from_value(raw)
    }

    fn from_value(mut raw: Value) -> Result<Self, ConfigValidationError> {
        normalize_keyed_steps(&mut raw);
        let config: PipelineConfig =
            serde_json::from_value(raw).map_err(|e| ConfigValidationError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Structural checks that need no atom registry
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        // The name becomes a path component under the data location
        let name = self.name.as_str();
        if name.is_empty() || name == "." || name.contains(['/', '\\']) || name.contains("..") {
            return Err(ConfigValidationError::InvalidName(self.name.clone()));
        }
        self.cache_point().map(|_| ())
    }

    /// Index of the step marked `load_if_cached`, if any
    pub fn cache_point(&self) -> Result<Option<usize>, ConfigValidationError> {
        let mut found = None;
        for (i, step) in self.steps.iter().enumerate() {
            if !step.load_if_cached {
                continue;
            }
            match found {
                None => found = Some(i),
                Some(first) => {
                    return Err(ConfigValidationError::MultipleCachePoints { first, second: i })
                }
            }
        }
        Ok(found)
    }
}

/// Rewrite `- AtomName: {params: ...}` entries into `- id: AtomName` form,
/// and bare string outputs into a binding map
fn normalize_keyed_steps(raw: &mut Value) {
    let Some(steps) = raw.get_mut("steps").and_then(Value::as_array_mut) else {
        return;
    };
    for step in steps.iter_mut() {
        let Some(map) = step.as_object() else { continue };
        if map.len() != 1 || map.contains_key("id") {
            continue;
        }
        let Some((atom, body)) = map.iter().next() else { continue };
        let mut body = match body {
            Value::Object(body) => body.clone(),
            Value::Null => serde_json::Map::new(),
            _ => continue,
        };
        body.insert("id".to_string(), Value::String(atom.clone()));
        *step = Value::Object(body);
    }
    for step in steps.iter_mut() {
        expand_bare_outputs(step);
    }
}

/// Rewrite `outputs: configured__` into `outputs: {configured__: configured__}`
fn expand_bare_outputs(step: &mut Value) {
    let Some(outputs) = step.get_mut("outputs") else { return };
    if let Value::String(binding) = outputs {
        let mut map = serde_json::Map::new();
        map.insert(binding.clone(), Value::String(binding.clone()));
        *outputs = Value::Object(map);
    }
}
