//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    /// Override the data strategy's data_location
    #[arg(long)]
    pub data_location: Option<PathBuf>,

    /// Print the returned values as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML or JSON file
    #[arg(short, long)]
    pub file: String,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Describe registered atoms
#[derive(Debug, Args, Clone)]
pub struct AtomsCommand {
    /// Only describe this atom
    #[arg(short, long)]
    pub name: Option<String>,

    /// Output in JSON format instead of YAML
    #[arg(long)]
    pub json: bool,
}
