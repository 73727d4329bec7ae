//! Error types shared across the pipeline layers

use thiserror::Error;

/// Raised when a parsed configuration does not pass validation.
///
/// Always produced before any atom runs its business logic and always fatal
/// to the whole run.
#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Failed to parse pipeline configuration: {0}")]
    Parse(String),

    #[error("Step {step}: '{atom}' is not a registered atom")]
    UnknownAtom { step: usize, atom: String },

    #[error("'{key}' is not a valid configuration key for {atom}. Options are: {options:?}")]
    UnknownParameter {
        atom: String,
        key: String,
        options: Vec<String>,
    },

    #[error("Bad configuration for {atom}: '{key}' must be {expected}, got {found}")]
    ParameterType {
        atom: String,
        key: String,
        expected: String,
        found: String,
    },

    #[error("Bad configuration for {atom}: missing required parameter {key}:{expected}")]
    MissingParameter {
        atom: String,
        key: String,
        expected: String,
    },

    #[error("Validation failed for {atom}: {message}")]
    Validation { atom: String, message: String },

    #[error("'{0}' is not a valid data strategy")]
    UnknownStrategy(String),

    #[error("Step {step} ({atom}): atom has no {direction} named '{port}'")]
    UnknownPort {
        step: usize,
        atom: String,
        direction: &'static str,
        port: String,
    },

    #[error("Step {step} ({atom}): atom expects an input named '{port}'")]
    MissingPort { step: usize, atom: String, port: String },

    #[error("Step {step} ({atom}): cannot return from unconfigured output '{port}'")]
    ReturnFromUnconfiguredOutput { step: usize, atom: String, port: String },

    #[error("Step {step} ({atom}): return name '{name}' is already returned by an earlier step")]
    DuplicateReturn { step: usize, atom: String, name: String },

    #[error("Step {step} ({atom}): input '{binding}' is not produced by any earlier step")]
    UnresolvedBinding {
        step: usize,
        atom: String,
        binding: String,
    },

    #[error("Step {step} ({atom}): output '{binding}' is already produced by an earlier step")]
    DuplicateBinding {
        step: usize,
        atom: String,
        binding: String,
    },

    #[error("Step {step} ({atom}): input '{binding}' expects {expected} but is produced as {found}")]
    PortTypeMismatch {
        step: usize,
        atom: String,
        binding: String,
        expected: String,
        found: String,
    },

    #[error("Only one cache point can be specified per configuration (steps {first} and {second})")]
    MultipleCachePoints { first: usize, second: usize },

    #[error("Pipeline name '{0}' cannot be used as a directory name")]
    InvalidName(String),
}

/// Errors from a data strategy reading or writing documents.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Cannot use {0} if no data strategy is bound")]
    Unbound(&'static str),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Cache index error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0} across multiple documents is not supported ({1:?})")]
    MultiDocument(&'static str, Vec<String>),

    #[error("Binding '{0}' is not assigned to any document")]
    UnmappedBinding(String),

    #[error("Column '{0}' not found")]
    MissingColumn(String),

    #[error("Cannot decode cell {value:?} in column '{column}' as {expected}")]
    Decode {
        column: String,
        value: String,
        expected: String,
    },

    #[error("Step has no outputs to write")]
    NoOutputs,

    #[error("No cache entry registered for hash {0}")]
    MissingCacheEntry(String),

    #[error(transparent)]
    Collage(#[from] CollageError),
}

/// Errors raised by the multi-document [`crate::storage::Collage`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CollageError {
    #[error("Column '{0}' appears in two documents")]
    DuplicateColumn(String),

    #[error("Column '{0}' not found in any document")]
    UnknownColumn(String),

    #[error("Column '{column}' has {expected} rows, cannot set {found} values")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },

    #[error("Cannot set '{column}': no document has {rows} rows. Try set_or_create")]
    NoMatchingLength { column: String, rows: usize },

    #[error("Cannot set '{column}': documents {documents:?} all have {rows} rows")]
    AmbiguousLength {
        column: String,
        rows: usize,
        documents: Vec<String>,
    },

    #[error("Document '{0}' not found")]
    UnknownDocument(String),
}

/// Errors raised from inside an atom call.
#[derive(Debug, Error)]
pub enum AtomError {
    /// A discovery-style atom found nothing. Halts the remaining steps
    /// without failing the run.
    #[error("No discoverable data: {0}")]
    NoDiscovery(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Task(#[from] anyhow::Error),
}

/// Top-level error for assembling or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigValidationError),

    #[error("Storage setup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Step {step} ({task_name}) failed: {source}")]
    Step {
        step: usize,
        task_name: String,
        #[source]
        source: AtomError,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn csv(path: impl AsRef<std::path::Path>, source: csv::Error) -> Self {
        StorageError::Csv {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
