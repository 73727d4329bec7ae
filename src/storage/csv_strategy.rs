//! Document-partitioned CSV storage with prefix caching
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<name>-meta.json          cache index shared by every run of <name>
//! <root>/<name>-<n>/<doc>_output.csv
//! ```

use super::cache::{run_hash, CacheIndex};
use super::codec::{decode_column, read_document, write_document};
use super::documents::{assign_documents, document_names};
use super::{CacheDirective, Collage, DataStrategy, StepStorage, StorageDescriptor};
use crate::atom::{PortSchema, ValueType};
use crate::core::config::{DataStrategyConfig, PipelineConfig};
use crate::core::error::{PipelineError, StorageError};
use crate::core::table::Table;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Stores every document as `<doc>_output.csv` in a fresh run directory
#[derive(Debug, Clone)]
pub struct CsvStrategy {
    name: String,
}

impl CsvStrategy {
    pub fn new() -> Self {
        Self {
            name: "CsvStrategy".to_string(),
        }
    }
}

impl Default for CsvStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of a document inside a run directory
pub fn document_path(run_directory: &Path, document: &str) -> PathBuf {
    run_directory.join(format!("{document}_output.csv"))
}

/// Create `<root>/<name>-<n>` for the first `n` not already taken
fn allocate_run_directory(root: &Path, name: &str) -> Result<PathBuf, StorageError> {
    let mut run_number = 0usize;
    loop {
        let candidate = root.join(format!("{name}-{run_number}"));
        if !candidate.exists() {
            std::fs::create_dir(&candidate).map_err(|e| StorageError::io(&candidate, e))?;
            return Ok(candidate);
        }
        run_number += 1;
    }
}

impl DataStrategy for CsvStrategy {
    fn setup_config(&self, config: &mut PipelineConfig) -> Result<(), PipelineError> {
        // Checked before anything touches the filesystem
        let cache_point = config.cache_point()?;

        let strategy = config
            .data_strategy
            .clone()
            .unwrap_or_else(|| DataStrategyConfig::new(self.name.clone(), "data/"));
        let document_map = Arc::new(assign_documents(&config.steps)?);

        let root = strategy.data_location;
        std::fs::create_dir_all(&root).map_err(|e| StorageError::io(&root, e))?;
        let run_directory = allocate_run_directory(&root, &config.name)?;
        info!("Run directory: {}", run_directory.display());

        for document in document_names(&document_map) {
            write_document(&document_path(&run_directory, &document), &Table::new())?;
        }

        let cache_hash = run_hash(&config.steps, cache_point);
        let meta_path = root.join(format!("{}-meta.json", config.name));
        let index = CacheIndex::load_or_init(&meta_path)?;

        let mut directives = vec![CacheDirective::None; config.steps.len()];
        let mut cache_location = None;
        if let (Some(point), Some(hash)) = (cache_point, cache_hash.as_deref()) {
            match index.lookup(hash) {
                Some(location) if location.exists() => {
                    warn!("This run will use a cache ({})", hash);
                    directives[..point].fill(CacheDirective::Skip);
                    directives[point] = CacheDirective::Load;
                    cache_location = Some(location.to_path_buf());

                    let cached_directory = location.parent().unwrap_or(Path::new(""));
                    let mut cached_documents: Vec<&String> = Vec::new();
                    for step in &config.steps[..=point] {
                        for binding in step.outputs.values() {
                            if let Some(document) = document_map.get(binding) {
                                if !cached_documents.contains(&document) {
                                    cached_documents.push(document);
                                }
                            }
                        }
                    }
                    for document in cached_documents {
                        let original = document_path(cached_directory, document);
                        let copy = document_path(&run_directory, document);
                        std::fs::copy(&original, &copy)
                            .map_err(|e| StorageError::io(&original, e))?;
                        debug!("Copied cached document {}", original.display());
                    }
                }
                Some(location) => {
                    warn!(
                        "Cached output {} no longer exists; running without the cache",
                        location.display()
                    );
                    directives[point] = CacheDirective::Save;
                }
                None => directives[point] = CacheDirective::Save,
            }
        }

        for (step, cache) in config.steps.iter_mut().zip(directives) {
            step.storage = Some(StorageDescriptor {
                strategy: strategy.id.clone(),
                run_directory: run_directory.clone(),
                inputs: step.inputs.clone(),
                outputs: step.outputs.clone(),
                document_map: Arc::clone(&document_map),
                cache,
                cache_hash: cache_hash.clone(),
                cache_location: cache_location.clone(),
                meta_path: meta_path.clone(),
            });
        }
        Ok(())
    }

    fn bind(
        &self,
        descriptor: &StorageDescriptor,
        inputs: &PortSchema,
        outputs: &PortSchema,
    ) -> Result<Box<dyn StepStorage>, StorageError> {
        Ok(Box::new(CsvStepStorage {
            descriptor: descriptor.clone(),
            input_types: inputs.clone(),
            output_types: outputs.clone(),
        }))
    }
}

/// CSV storage bound to one atom instance
#[derive(Debug)]
pub struct CsvStepStorage {
    descriptor: StorageDescriptor,
    input_types: PortSchema,
    output_types: PortSchema,
}

impl CsvStepStorage {
    fn single_document<'a, I>(&self, bindings: I, action: &'static str) -> Result<String, StorageError>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut documents: Vec<String> = Vec::new();
        for binding in bindings {
            let document = self
                .descriptor
                .document_map
                .get(binding)
                .ok_or_else(|| StorageError::UnmappedBinding(binding.clone()))?;
            if !documents.contains(document) {
                documents.push(document.clone());
            }
        }
        if documents.len() == 1 {
            Ok(documents.remove(0))
        } else {
            Err(StorageError::MultiDocument(action, documents))
        }
    }

    /// The document this step operates on: its inputs' if it has any,
    /// otherwise its outputs'
    fn backing_document(&self, action: &'static str) -> Result<String, StorageError> {
        if self.descriptor.inputs.is_empty() {
            self.single_document(self.descriptor.outputs.values(), action)
        } else {
            self.single_document(self.descriptor.inputs.values(), action)
        }
    }

    fn path_of(&self, document: &str) -> PathBuf {
        document_path(&self.descriptor.run_directory, document)
    }

    fn results_template(&self) -> Table {
        Table::with_columns(self.output_types.keys().cloned())
    }
}

impl StepStorage for CsvStepStorage {
    fn get_data(&mut self, cache: bool) -> Result<(Table, Table), StorageError> {
        if self.descriptor.inputs.is_empty() {
            return Ok((Table::new(), self.results_template()));
        }

        let document = self.single_document(self.descriptor.inputs.values(), "reads")?;
        let path = if cache {
            // The registered location is the cache point's own output; its
            // inputs may live in another document of the same cached run
            let location = self.descriptor.cache_location.as_deref().ok_or_else(|| {
                StorageError::MissingCacheEntry(self.descriptor.cache_hash.clone().unwrap_or_default())
            })?;
            info!("Loading input from cache");
            document_path(location.parent().unwrap_or(Path::new("")), &document)
        } else {
            self.path_of(&document)
        };

        let stored = read_document(&path)?;
        let mut data = Table::new();
        for (port, binding) in &self.descriptor.inputs {
            let raw = stored
                .column(binding)
                .ok_or_else(|| StorageError::MissingColumn(binding.clone()))?;
            let expected = self.input_types.get(port).copied().unwrap_or(ValueType::Any);
            data.set_column(port.clone(), decode_column(binding, raw, expected)?)?;
        }
        Ok((data, self.results_template()))
    }

    fn write_data(&mut self, results: &Table, cache: bool) -> Result<(), StorageError> {
        if self.descriptor.outputs.is_empty() {
            return Err(StorageError::NoOutputs);
        }
        let document = self.single_document(self.descriptor.outputs.values(), "writes")?;
        let path = self.path_of(&document);
        debug!("Writing {}", path.display());

        let mut collage = Collage::new([(document.clone(), read_document(&path)?)])?;
        for (port, binding) in &self.descriptor.outputs {
            let values = results
                .column(port)
                .ok_or_else(|| StorageError::MissingColumn(port.clone()))?
                .to_vec();
            collage.set_or_create(binding, values, &document)?;
        }
        for (name, table) in collage.documents() {
            write_document(&self.path_of(name), table)?;
        }

        if cache {
            let hash = self
                .descriptor
                .cache_hash
                .as_deref()
                .ok_or_else(|| StorageError::MissingCacheEntry(String::new()))?;
            info!("Writing output to cache");
            CacheIndex::register(&self.descriptor.meta_path, hash, &path)?;
        }
        Ok(())
    }

    fn apply_filter(&mut self, keep: &[bool]) -> Result<(), StorageError> {
        let document = self.backing_document("filters")?;
        let path = self.path_of(&document);

        let mut collage = Collage::new([(document.clone(), read_document(&path)?)])?;
        collage.drop_rows(&document, keep)?;
        if let Some(table) = collage.document(&document) {
            write_document(&path, table)?;
        }
        Ok(())
    }

    fn get_columns(&mut self, columns: &[&str]) -> Result<Table, StorageError> {
        let document = self.backing_document("column reads")?;
        let stored = read_document(&self.path_of(&document))?;
        let projected = stored.select(columns)?;

        let mut table = Table::new();
        for (name, raw) in projected.columns() {
            table.set_column(name, decode_column(name, raw, ValueType::Any)?)?;
        }
        Ok(table)
    }
}
