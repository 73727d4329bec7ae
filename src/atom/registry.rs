//! Name -> atom type registry and documentation export

use super::{AtomType, TypeMetadata};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

/// Registered atom types, in registration order
#[derive(Debug, Default, Clone)]
pub struct AtomRegistry {
    atoms: IndexMap<String, Arc<AtomType>>,
}

/// Self-description of one atom type
#[derive(Debug, Clone, Serialize)]
pub struct AtomDoc {
    pub helpstring: String,
    pub params: IndexMap<String, String>,
    pub defaults: IndexMap<String, Value>,
    pub inputs: IndexMap<String, String>,
    pub outputs: IndexMap<String, String>,
    /// Param whose `{column: type}` map supplies the outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configured_outputs: Option<String>,
    pub creates_new_document: bool,
}

impl AtomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in atom
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        crate::atoms::register_builtin(&mut registry);
        registry
    }

    /// Register an atom type under its own name
    pub fn register(&mut self, atom: AtomType) {
        let name = atom.name().to_string();
        if self.atoms.insert(name.clone(), Arc::new(atom)).is_some() {
            warn!("Atom '{}' was registered twice; keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<AtomType>> {
        self.atoms.get(name).cloned()
    }

    pub fn metadata(&self, name: &str) -> Option<TypeMetadata> {
        self.atoms.get(name).map(|atom| atom.metadata())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.atoms.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.atoms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Describe every registered atom
    pub fn documentation(&self) -> IndexMap<String, AtomDoc> {
        self.atoms
            .iter()
            .map(|(name, atom)| (name.clone(), document(atom)))
            .collect()
    }
}

fn document(atom: &AtomType) -> AtomDoc {
    let mut params = IndexMap::new();
    let mut defaults = IndexMap::new();
    for field in atom.schema().fields() {
        params.insert(field.name.clone(), field.ty.to_string());
        if let Some(default) = &field.default {
            defaults.insert(field.name.clone(), default.clone());
        }
    }
    let ports = |schema: &super::PortSchema| {
        schema
            .iter()
            .map(|(port, ty)| (port.clone(), ty.to_string()))
            .collect::<IndexMap<_, _>>()
    };

    AtomDoc {
        helpstring: atom.description().to_string(),
        params,
        defaults,
        inputs: ports(atom.inputs()),
        outputs: ports(atom.outputs()),
        configured_outputs: atom.configured_outputs().map(str::to_string),
        creates_new_document: atom.creates_new_document(),
    }
}
