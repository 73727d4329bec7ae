//! CSV document persistence and cell type coercion
//!
//! Cells are persisted as text: strings verbatim, null as an empty cell, and
//! every other value as its JSON literal. Reading back keeps the raw text
//! until a port's declared type asks for it to be parsed.

use crate::atom::ValueType;
use crate::core::error::StorageError;
use crate::core::table::Table;
use serde_json::Value;
use std::path::Path;

/// Read a document; an empty file is an empty table
pub fn read_document(path: &Path) -> Result<Table, StorageError> {
    read_delimited(path, b',')
}

/// Read a headed file with the given field delimiter
pub fn read_delimited(path: &Path, delimiter: u8) -> Result<Table, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    if content.trim().is_empty() {
        return Ok(Table::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| StorageError::csv(path, e))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(|e| StorageError::csv(path, e))?;
        for (column, cell) in columns.iter_mut().zip(record.iter()) {
            column.push(raw_cell(cell));
        }
    }

    let mut table = Table::new();
    for (name, values) in headers.into_iter().zip(columns) {
        table.set_column(name, values)?;
    }
    Ok(table)
}

/// Write a document, replacing the file
pub fn write_document(path: &Path, table: &Table) -> Result<(), StorageError> {
    if table.is_empty() {
        return std::fs::write(path, "").map_err(|e| StorageError::io(path, e));
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| StorageError::csv(path, e))?;
    writer
        .write_record(table.column_names())
        .map_err(|e| StorageError::csv(path, e))?;

    let columns: Vec<&[Value]> = table.columns().map(|(_, values)| values).collect();
    for row in 0..table.row_count() {
        let record: Vec<String> = columns
            .iter()
            .map(|values| values.get(row).map(encode_cell).unwrap_or_default())
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| StorageError::csv(path, e))?;
    }
    writer
        .flush()
        .map_err(|e| StorageError::io(path, e))?;
    Ok(())
}

/// Persisted text form of a cell
pub fn encode_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn raw_cell(cell: &str) -> Value {
    if cell.is_empty() {
        Value::Null
    } else {
        Value::String(cell.to_string())
    }
}

/// Reconstitute a cell for a port of the given type.
///
/// Null passes through, `string` and `date` ports keep the raw text, wildcard
/// ports parse when they can and otherwise keep the text, every other type
/// must parse as a literal.
pub fn decode_cell(column: &str, raw: &Value, expected: ValueType) -> Result<Value, StorageError> {
    let text = match raw {
        Value::Null => return Ok(Value::Null),
        Value::String(text) => text,
        already_typed => return Ok(already_typed.clone()),
    };
    match expected {
        ValueType::String | ValueType::Date => Ok(raw.clone()),
        ValueType::Any => Ok(serde_json::from_str(text).unwrap_or_else(|_| raw.clone())),
        _ => serde_json::from_str(text).map_err(|_| StorageError::Decode {
            column: column.to_string(),
            value: text.clone(),
            expected: expected.to_string(),
        }),
    }
}

/// Decode a whole column
pub fn decode_column(
    column: &str,
    raw: &[Value],
    expected: ValueType,
) -> Result<Vec<Value>, StorageError> {
    raw.iter()
        .map(|cell| decode_cell(column, cell, expected))
        .collect()
}
