//! Prefix caching: run content hash and the file-backed hash index

use crate::core::config::StepConfig;
use crate::core::error::StorageError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Contents of `<root>/<name>-meta.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheIndex {
    /// Run hash -> path of the document written by the cache point
    pub cache_hashes: IndexMap<String, PathBuf>,
}

impl CacheIndex {
    /// Load the index, creating an empty one on disk if absent
    pub fn load_or_init(path: &Path) -> Result<Self, StorageError> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
            Ok(serde_json::from_str(&content)?)
        } else {
            let index = Self::default();
            index.save(path)?;
            Ok(index)
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| StorageError::io(path, e))
    }

    pub fn lookup(&self, hash: &str) -> Option<&Path> {
        self.cache_hashes.get(hash).map(PathBuf::as_path)
    }

    /// Re-read the index, record one entry and write it back
    pub fn register(path: &Path, hash: &str, location: &Path) -> Result<(), StorageError> {
        let mut index = Self::load_or_init(path)?;
        index
            .cache_hashes
            .insert(hash.to_string(), location.to_path_buf());
        index.save(path)
    }
}

/// Deterministic content hash of every step up to and including the cache
/// point. `None` when no cache point is configured.
pub fn run_hash(steps: &[StepConfig], cache_index: Option<usize>) -> Option<String> {
    let cache_index = cache_index?;
    let mut parts = Vec::with_capacity((cache_index + 1) * 3);
    for step in steps.iter().take(cache_index + 1) {
        parts.push(to_canonical_json(&map_value(&step.params)));
        parts.push(port_map_string(&step.inputs));
        parts.push(port_map_string(&step.outputs));
    }
    Some(sha1_hex(&parts.join(",")))
}

fn sha1_hex(input: &str) -> String {
    format!("{:x}", Sha1::digest(input.as_bytes()))
}

fn map_value(map: &IndexMap<String, Value>) -> Value {
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

fn port_map_string(ports: &IndexMap<String, String>) -> String {
    if ports.is_empty() {
        return "null".to_string();
    }
    let value = Value::Object(
        ports
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    );
    to_canonical_json(&value)
}

/// Serialize a JSON value with object keys sorted and no whitespace
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> =
                map.iter().map(|(k, v)| (k, to_canonical_json(v))).collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(k, v)| format!("{}:{}", Value::String(k.clone()), v))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        scalar => scalar.to_string(),
    }
}
