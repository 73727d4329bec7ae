//! Loading external CSV files into a pipeline

use crate::atom::{Atom, AtomType, FieldSpec, PortSchema, TaskContext, ValueType};
use crate::core::error::{AtomError, StorageError};
use crate::core::table::Table;
use crate::storage::codec::{decode_column, read_delimited};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Delimiters tried in order; spreadsheet exports are often tab-separated
const DELIMITERS: [u8; 2] = [b',', b'\t'];

/// Reads the `columns` of a CSV file at `location` into a new document.
///
/// Steps set `outputs: configured__`; each configured column becomes an
/// output bound under its own name.
pub fn read_csv() -> AtomType {
    AtomType::builder("ReadCSV")
        .describe(
            "Read the contents of a CSV file. Set 'location' to the file and 'columns' to the \
             names and types of the columns to load. Requires 'outputs: configured__'.",
        )
        .param(FieldSpec::required("location", ValueType::String))
        .param(FieldSpec::required("columns", ValueType::Map))
        .validate(|params| match params.get("columns").and_then(Value::as_object) {
            Some(columns) if !columns.is_empty() => Ok(()),
            _ => Err("'columns' must name at least one column".into()),
        })
        .configured_outputs("columns")
        .new_document()
        .build(|params| {
            let columns: PortSchema = params
                .get("columns")
                .and_then(Value::as_object)
                .map(|columns| {
                    columns
                        .iter()
                        .filter_map(|(name, ty)| {
                            let ty = ty.as_str()?.parse::<ValueType>().ok()?;
                            Some((name.clone(), ty))
                        })
                        .collect()
                })
                .unwrap_or_default();
            Ok(Box::new(ReadCsv {
                location: PathBuf::from(params.str("location")?),
                columns,
            }))
        })
}

struct ReadCsv {
    location: PathBuf,
    columns: PortSchema,
}

/// First delimiter that parses and yields every wanted column
fn load_table(location: &Path, columns: &PortSchema) -> Result<Table, StorageError> {
    let mut last = None;
    for delimiter in DELIMITERS {
        let table = match read_delimited(location, delimiter) {
            Ok(table) => table,
            // A missing file fails the same way for every delimiter
            Err(e @ StorageError::Io { .. }) => return Err(e),
            Err(e) => {
                debug!(
                    "{} does not parse split on {:?}: {}",
                    location.display(),
                    delimiter as char,
                    e
                );
                last = Some(e);
                continue;
            }
        };
        match columns.keys().find(|name| !table.has_column(name)) {
            None => return Ok(table),
            Some(missing) => {
                debug!(
                    "{} lacks column '{}' when split on {:?}",
                    location.display(),
                    missing,
                    delimiter as char
                );
                last = Some(StorageError::MissingColumn(missing.clone()));
            }
        }
    }
    Err(last.unwrap_or_else(|| StorageError::MissingColumn(String::new())))
}

#[async_trait]
impl Atom for ReadCsv {
    async fn task_body(&mut self, task: &mut TaskContext<'_>) -> Result<(), AtomError> {
        let table = load_table(&self.location, &self.columns)?;
        for (name, ty) in &self.columns {
            let raw = table
                .column(name)
                .ok_or_else(|| StorageError::MissingColumn(name.clone()))?;
            let values = decode_column(name, raw, *ty)?;
            task.set_output(name, values)?;
        }
        Ok(())
    }
}
