//! Atoms that drop rows from their backing document

use crate::atom::{Atom, AtomType, FieldSpec, TaskContext, ValueType};
use crate::core::error::AtomError;
use async_trait::async_trait;
use serde_json::Value;

/// Drops every row whose value is not strictly greater than `n`
pub fn filter_below_n() -> AtomType {
    AtomType::builder("FilterBelowN")
        .describe("Drop rows whose value is not greater than 'n'. Removes data from the document.")
        .param(FieldSpec::required("n", ValueType::Int))
        .input("to_compare", ValueType::Int)
        .build(|params| Ok(Box::new(FilterBelowN { n: params.int("n")? })))
}

struct FilterBelowN {
    n: i64,
}

fn keep_mask(values: &[Value], n: i64) -> Vec<bool> {
    values
        .iter()
        .map(|v| v.as_i64().is_some_and(|x| x > n))
        .collect()
}

#[async_trait]
impl Atom for FilterBelowN {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let keep = keep_mask(task.input("to_compare")?, self.n);
        task.apply_filter(&keep)?;
        Ok(())
    }
}
