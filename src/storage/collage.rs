//! A virtual table spanning several physical documents
//!
//! Columns are addressed by name across every document. Two indices back the
//! lookup: column -> owning document, and row count -> documents with that
//! many rows. The row-count index is only used to place a brand-new column,
//! and it is rebuilt after every mutation that can change a row count.

use crate::core::error::CollageError;
use crate::core::table::Table;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Collage {
    documents: IndexMap<String, Table>,
    column_index: HashMap<String, String>,
    length_index: HashMap<usize, Vec<String>>,
}

impl Collage {
    /// Build a collage from named tables. Fails if a column name appears in
    /// more than one document.
    pub fn new<I, S>(documents: I) -> Result<Self, CollageError>
    where
        I: IntoIterator<Item = (S, Table)>,
        S: Into<String>,
    {
        let mut collage = Self::default();
        for (name, table) in documents {
            let name = name.into();
            for column in table.column_names() {
                if collage.column_index.contains_key(column) {
                    return Err(CollageError::DuplicateColumn(column.to_string()));
                }
                collage.column_index.insert(column.to_string(), name.clone());
            }
            collage.documents.insert(name, table);
        }
        collage.rebuild_length_index();
        Ok(collage)
    }

    /// All column names, grouped by document
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.documents.values().flat_map(|t| t.column_names())
    }

    pub fn document(&self, name: &str) -> Option<&Table> {
        self.documents.get(name)
    }

    pub fn documents(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.documents.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Document owning a column
    pub fn document_of(&self, column: &str) -> Option<&str> {
        self.column_index.get(column).map(String::as_str)
    }

    pub fn get(&self, column: &str) -> Result<&[Value], CollageError> {
        let document = self
            .column_index
            .get(column)
            .ok_or_else(|| CollageError::UnknownColumn(column.to_string()))?;
        self.documents
            .get(document)
            .and_then(|t| t.column(column))
            .ok_or_else(|| CollageError::UnknownColumn(column.to_string()))
    }

    /// Overwrite an existing column, or attach a new one to the single
    /// document whose row count matches `values`.
    ///
    /// A new column whose length matches no document fails with
    /// [`CollageError::NoMatchingLength`]; one whose length matches several
    /// documents fails with [`CollageError::AmbiguousLength`]. Use
    /// [`Collage::set_or_create`] to name the target explicitly.
    pub fn set(&mut self, column: &str, values: Vec<Value>) -> Result<(), CollageError> {
        if let Some(document) = self.column_index.get(column).cloned() {
            return self.set_in(&document, column, values);
        }

        let rows = values.len();
        let document = match self.length_index.get(&rows).map(Vec::as_slice) {
            None | Some([]) => {
                return Err(CollageError::NoMatchingLength {
                    column: column.to_string(),
                    rows,
                })
            }
            Some([document]) => document.clone(),
            Some(documents) => {
                return Err(CollageError::AmbiguousLength {
                    column: column.to_string(),
                    rows,
                    documents: documents.to_vec(),
                })
            }
        };
        self.set_in(&document, column, values)
    }

    /// Set a column, placing it in `document` if it does not exist yet.
    /// The document is created when absent.
    pub fn set_or_create(
        &mut self,
        column: &str,
        values: Vec<Value>,
        document: &str,
    ) -> Result<(), CollageError> {
        if self.column_index.contains_key(column) {
            return self.set(column, values);
        }
        self.documents.entry(document.to_string()).or_default();
        self.set_in(document, column, values)
    }

    /// Remove rows from a document in place
    pub fn drop_rows(&mut self, document: &str, keep: &[bool]) -> Result<(), CollageError> {
        let table = self
            .documents
            .get_mut(document)
            .ok_or_else(|| CollageError::UnknownDocument(document.to_string()))?;
        table.retain_rows(keep)?;
        self.rebuild_length_index();
        Ok(())
    }

    /// Remove the rows whose value in a boolean column is `false`, from the
    /// document owning that column
    pub fn drop_where_false(&mut self, column: &str) -> Result<(), CollageError> {
        let keep: Vec<bool> = self
            .get(column)?
            .iter()
            .map(|v| v.as_bool() != Some(false))
            .collect();
        let document = self
            .document_of(column)
            .map(str::to_string)
            .ok_or_else(|| CollageError::UnknownColumn(column.to_string()))?;
        self.drop_rows(&document, &keep)
    }

    fn set_in(
        &mut self,
        document: &str,
        column: &str,
        values: Vec<Value>,
    ) -> Result<(), CollageError> {
        let table = self
            .documents
            .get_mut(document)
            .ok_or_else(|| CollageError::UnknownDocument(document.to_string()))?;
        table.set_column(column, values)?;
        self.column_index
            .insert(column.to_string(), document.to_string());
        self.rebuild_length_index();
        Ok(())
    }

    fn rebuild_length_index(&mut self) {
        self.length_index.clear();
        for (name, table) in &self.documents {
            if table.is_empty() {
                continue;
            }
            self.length_index
                .entry(table.row_count())
                .or_default()
                .push(name.clone());
        }
    }
}
