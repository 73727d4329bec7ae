//! Column-oriented table of JSON cell values

use crate::core::error::CollageError;
use indexmap::IndexMap;
use serde_json::Value;

/// An ordered set of named columns.
///
/// Empty columns act as placeholders: a results table is seeded with one
/// empty column per output port and an atom fills them in any order. Every
/// non-empty column must share the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexMap<String, Vec<Value>>,
}

impl Table {
    /// Create a table with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with one empty placeholder column per name
    pub fn with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names.into_iter().map(|n| (n.into(), Vec::new())).collect(),
        }
    }

    /// Number of rows, taken from the first non-empty column
    pub fn row_count(&self) -> usize {
        self.columns
            .values()
            .map(Vec::len)
            .find(|len| *len > 0)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, name: &str) -> Option<&[Value]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Set or add a column.
    ///
    /// Fails when the table already holds rows and `values` has a different,
    /// non-zero length.
    pub fn set_column(
        &mut self,
        name: impl Into<String>,
        values: Vec<Value>,
    ) -> Result<(), CollageError> {
        let name = name.into();
        let rows = self.rows_excluding(&name);
        if rows > 0 && !values.is_empty() && values.len() != rows {
            return Err(CollageError::LengthMismatch {
                column: name,
                expected: rows,
                found: values.len(),
            });
        }
        self.columns.insert(name, values);
        Ok(())
    }

    /// Keep only the rows whose mask entry is `true`
    pub fn retain_rows(&mut self, keep: &[bool]) -> Result<(), CollageError> {
        let rows = self.row_count();
        if keep.len() != rows {
            return Err(CollageError::LengthMismatch {
                column: "<filter mask>".to_string(),
                expected: rows,
                found: keep.len(),
            });
        }
        for values in self.columns.values_mut() {
            if values.is_empty() {
                continue;
            }
            let mut mask = keep.iter();
            values.retain(|_| mask.next().copied().unwrap_or(false));
        }
        Ok(())
    }

    /// Project the table onto the named columns, in the order given
    pub fn select<S: AsRef<str>>(&self, names: &[S]) -> Result<Table, CollageError> {
        let mut selected = Table::new();
        for name in names {
            let name = name.as_ref();
            let values = self
                .columns
                .get(name)
                .ok_or_else(|| CollageError::UnknownColumn(name.to_string()))?;
            selected.columns.insert(name.to_string(), values.clone());
        }
        Ok(selected)
    }

    fn rows_excluding(&self, name: &str) -> usize {
        self.columns
            .iter()
            .filter(|(k, _)| k.as_str() != name)
            .map(|(_, v)| v.len())
            .find(|len| *len > 0)
            .unwrap_or(0)
    }
}
