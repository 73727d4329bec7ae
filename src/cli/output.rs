//! CLI output formatting

use crate::core::{ExecutionStatus, StepState};
use crate::execution::ExecutionEvent;
use crate::storage::CacheDirective;
use console::Emoji;
use serde_json::Value;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Format a step state for display
pub fn format_step_state(state: &StepState) -> String {
    match state {
        StepState::Pending => style("PENDING").dim().to_string(),
        StepState::Running { .. } => style("RUNNING").yellow().to_string(),
        StepState::Completed { .. } => style("COMPLETED").green().to_string(),
        StepState::Skipped { .. } => style("SKIPPED").dim().to_string(),
        StepState::Halted { .. } => style("HALTED").yellow().to_string(),
        StepState::Failed { .. } => style("FAILED").red().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Halted => style("HALTED").yellow().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Short label for a step's cache directive; empty when caching is inert
pub fn format_cache_directive(directive: CacheDirective) -> String {
    match directive {
        CacheDirective::None => String::new(),
        CacheDirective::Skip => style("[cache: skip]").dim().to_string(),
        CacheDirective::Load => style("[cache: load]").cyan().to_string(),
        CacheDirective::Save => style("[cache: save]").magenta().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} with {} steps ({})",
            ROCKET,
            style(pipeline_name).bold(),
            total_steps,
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStarted { index, task_name } => {
            format!("{} [{}] {}", SPINNER, index, style(task_name).cyan())
        }
        ExecutionEvent::StepSkipped {
            index,
            task_name,
            reason,
        } => format!(
            "{} [{}] {} ({})",
            SKIP,
            index,
            style(task_name).dim(),
            reason
        ),
        ExecutionEvent::StepCompleted {
            index,
            task_name,
            returned,
        } => {
            if returned.is_empty() {
                format!("{} [{}] {}", CHECK, index, style(task_name).green())
            } else {
                format!(
                    "{} [{}] {} → {}",
                    CHECK,
                    index,
                    style(task_name).green(),
                    style(returned.join(", ")).cyan()
                )
            }
        }
        ExecutionEvent::StepFailed {
            index,
            task_name,
            error,
        } => format!(
            "{} [{}] {}: {}",
            CROSS,
            index,
            style(task_name).red(),
            style(error).dim()
        ),
        ExecutionEvent::PipelineHalted {
            index,
            task_name,
            reason,
        } => format!(
            "{} [{}] {} found no data ({}); remaining steps skipped",
            WARN,
            index,
            style(task_name).yellow(),
            reason
        ),
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        } => {
            let status_str = match status {
                ExecutionStatus::Completed => {
                    format!("{} completed", style("successfully").green())
                }
                ExecutionStatus::Halted => style("halted early").yellow().to_string(),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                _ => format!("{:?}", status),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(&execution_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// One-line summary of a returned column
pub fn format_return(name: &str, value: &Value, max_items: usize) -> String {
    let rendered = match value {
        Value::Array(items) if items.len() > max_items => {
            let shown: Vec<String> = items[..max_items].iter().map(Value::to_string).collect();
            format!(
                "[{}, ... {} more]",
                shown.join(", "),
                items.len() - max_items
            )
        }
        other => other.to_string(),
    };
    format!("  {}: {}", style(name).bold(), rendered)
}
