//! Partitioning of output bindings into documents

use crate::core::config::StepConfig;
use crate::core::error::ConfigValidationError;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Compute the binding -> document map for a whole pipeline.
///
/// A step starts a new document, named after its id, when it is flagged as
/// creating one, when it has no inputs, or when its inputs already span more
/// than one document. Every other step inherits the document of its inputs.
pub fn assign_documents(
    steps: &[StepConfig],
) -> Result<IndexMap<String, String>, ConfigValidationError> {
    let mut document_map: IndexMap<String, String> = IndexMap::new();
    let mut names: HashSet<String> = HashSet::new();

    for (index, step) in steps.iter().enumerate() {
        if step.outputs.is_empty() {
            continue;
        }

        let mut inherited: Vec<&str> = Vec::new();
        for binding in step.inputs.values() {
            let document = document_map.get(binding).ok_or_else(|| {
                ConfigValidationError::UnresolvedBinding {
                    step: index,
                    atom: step.id.clone(),
                    binding: binding.clone(),
                }
            })?;
            if !inherited.contains(&document.as_str()) {
                inherited.push(document);
            }
        }

        let document = match inherited.as_slice() {
            [single] if !step.new_document => single.to_string(),
            _ => fresh_name(&step.id, &mut names),
        };

        for binding in step.outputs.values() {
            if document_map.contains_key(binding) {
                return Err(ConfigValidationError::DuplicateBinding {
                    step: index,
                    atom: step.id.clone(),
                    binding: binding.clone(),
                });
            }
            document_map.insert(binding.clone(), document.clone());
        }
    }

    Ok(document_map)
}

/// Distinct document names in first-assignment order
pub fn document_names(document_map: &IndexMap<String, String>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for document in document_map.values() {
        if !names.contains(document) {
            names.push(document.clone());
        }
    }
    names
}

fn fresh_name(base: &str, taken: &mut HashSet<String>) -> String {
    let mut name = base.to_string();
    let mut n = 1;
    while taken.contains(&name) {
        name = format!("{base}-{n}");
        n += 1;
    }
    taken.insert(name.clone());
    name
}
