//! Pluggable storage ("data strategy") layer
//!
//! A [`DataStrategy`] is consulted once per pipeline, before any atom exists,
//! to rewrite the configuration with a private [`StorageDescriptor`] per step.
//! Each atom instance then binds its own [`StepStorage`] from that
//! descriptor and uses it to load inputs and persist outputs.

pub mod cache;
pub mod codec;
pub mod collage;
pub mod csv_strategy;
pub mod documents;
pub mod no_strategy;

pub use cache::{run_hash, CacheIndex};
pub use collage::Collage;
pub use csv_strategy::CsvStrategy;
pub use no_strategy::NoStrategy;

use crate::atom::PortSchema;
use crate::core::config::{PipelineConfig, PortMap};
use crate::core::error::{PipelineError, StorageError};
use crate::core::table::Table;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Name of the strategy used when a pipeline configures none
pub const NO_STRATEGY: &str = "NoStrategy";

/// Per-step caching behaviour decided at setup time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDirective {
    /// Caching is inert for this step
    #[default]
    None,
    /// A later step loads from cache; this step does nothing
    Skip,
    /// The cache point on a cache hit: inputs come from the cached run
    Load,
    /// The cache point on a cache miss: register outputs after writing
    Save,
}

/// Storage information attached to a step by its data strategy
#[derive(Debug, Clone)]
pub struct StorageDescriptor {
    /// Registered strategy name
    pub strategy: String,

    /// This run's private directory
    pub run_directory: PathBuf,

    /// Input port -> binding, as configured
    pub inputs: PortMap,

    /// Output port -> binding, as configured
    pub outputs: PortMap,

    /// Binding -> document, shared by every step of the run
    pub document_map: Arc<IndexMap<String, String>>,

    pub cache: CacheDirective,

    /// Content hash of the pipeline prefix up to the cache point
    pub cache_hash: Option<String>,

    /// Document registered under `cache_hash`, on a cache hit
    pub cache_location: Option<PathBuf>,

    /// Process-wide cache index file
    pub meta_path: PathBuf,
}

/// A storage backend for one pipeline
pub trait DataStrategy: Send + Sync {
    /// Rewrite the configuration in place, attaching a storage descriptor to
    /// every step. Called once, before any atom is instantiated.
    fn setup_config(&self, config: &mut PipelineConfig) -> Result<(), PipelineError>;

    /// Bind per-step storage for one atom instance
    fn bind(
        &self,
        descriptor: &StorageDescriptor,
        inputs: &PortSchema,
        outputs: &PortSchema,
    ) -> Result<Box<dyn StepStorage>, StorageError>;
}

/// Storage bound to a single atom instance
pub trait StepStorage: Send {
    /// Load the operating table (one column per input port) and an empty
    /// results table (one placeholder column per output port)
    fn get_data(&mut self, cache: bool) -> Result<(Table, Table), StorageError>;

    /// Persist each configured output column from `results`
    fn write_data(&mut self, results: &Table, cache: bool) -> Result<(), StorageError>;

    /// Drop every row whose mask entry is `false` from the backing document
    fn apply_filter(&mut self, keep: &[bool]) -> Result<(), StorageError>;

    /// Project the backing document onto the named bindings
    fn get_columns(&mut self, columns: &[&str]) -> Result<Table, StorageError>;
}

/// Registry of data strategies by name
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn DataStrategy>>,
}

impl StrategyRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// The built-in strategies: `NoStrategy` and the CSV document strategy
    /// (registered as both `PandasStrategy` and `CsvStrategy`)
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        let csv: Arc<dyn DataStrategy> = Arc::new(CsvStrategy::new());
        registry.register(NO_STRATEGY, Arc::new(NoStrategy));
        registry.register("PandasStrategy", csv.clone());
        registry.register("CsvStrategy", csv);
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, strategy: Arc<dyn DataStrategy>) {
        let name = name.into();
        if self.strategies.insert(name.clone(), strategy).is_some() {
            warn!("Data strategy '{}' was registered twice; keeping the latest", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DataStrategy>> {
        self.strategies.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
