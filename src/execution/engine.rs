//! Main execution engine - runs an assembled pipeline in declared order

use crate::atom::StepOutcome;
use crate::core::error::{AtomError, PipelineError};
use crate::core::state::{ExecutionStatus, StepState};
use crate::execution::Pipeline;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        index: usize,
        task_name: String,
    },
    StepSkipped {
        index: usize,
        task_name: String,
        reason: String,
    },
    StepCompleted {
        index: usize,
        task_name: String,
        returned: Vec<String>,
    },
    StepFailed {
        index: usize,
        task_name: String,
        error: String,
    },
    PipelineHalted {
        index: usize,
        task_name: String,
        reason: String,
    },
    PipelineCompleted {
        execution_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// What a finished (or halted) run hands back to its caller
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    /// Return name -> returned column, merged across steps
    pub returns: IndexMap<String, Value>,
    /// True if any executed step was flagged restricted
    pub restricted: bool,
    /// Step that found no discoverable data, if the run halted
    pub halted_at: Option<usize>,
}

/// Sequential pipeline runner
pub struct ExecutionEngine {
    event_handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl ExecutionEngine {
    pub fn new() -> Self {
        Self {
            event_handlers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.lock().await.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    async fn emit_event(&self, event: ExecutionEvent) {
        let handlers = self.event_handlers.lock().await;
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline.
    ///
    /// A step reporting no discoverable data halts the run without failing
    /// it: the remaining steps are skipped and the returns gathered so far
    /// are kept. Any other step error aborts the run.
    pub async fn execute(&self, pipeline: &mut Pipeline) -> Result<RunOutcome, PipelineError> {
        let execution_id = pipeline.state.execution_id;

        info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);
        self.emit_event(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: pipeline.steps.len(),
        })
        .await;

        pipeline.state.start(pipeline.steps.len());

        let mut returns: IndexMap<String, Value> = IndexMap::new();
        let mut restricted = false;
        let mut halted_at: Option<usize> = None;

        for step in pipeline.steps.iter_mut() {
            let index = step.index;
            let task_name = step.task_name.clone();

            let instance = match (halted_at, step.take_instance()) {
                (None, Some(instance)) => instance,
                (halted, _) => {
                    let reason = if halted.is_some() {
                        "pipeline halted".to_string()
                    } else {
                        "already executed".to_string()
                    };
                    step.state = StepState::Skipped {
                        reason: reason.clone(),
                    };
                    pipeline.state.skipped_steps += 1;
                    self.emit_event(ExecutionEvent::StepSkipped {
                        index,
                        task_name,
                        reason,
                    })
                    .await;
                    continue;
                }
            };

            let started_at = chrono::Utc::now();
            step.state = StepState::Running { started_at };
            self.emit_event(ExecutionEvent::StepStarted {
                index,
                task_name: task_name.clone(),
            })
            .await;

            match instance.call().await {
                Ok(StepOutcome::Skipped) => {
                    let reason = "loaded from cache by a later step".to_string();
                    step.state = StepState::Skipped {
                        reason: reason.clone(),
                    };
                    pipeline.state.skipped_steps += 1;
                    self.emit_event(ExecutionEvent::StepSkipped {
                        index,
                        task_name,
                        reason,
                    })
                    .await;
                }
                Ok(StepOutcome::Completed {
                    returns: step_returns,
                    restricted: step_restricted,
                }) => {
                    restricted |= step_restricted;
                    let returned: Vec<String> = step_returns.keys().cloned().collect();
                    returns.extend(step_returns);
                    step.state = StepState::Completed {
                        started_at,
                        completed_at: chrono::Utc::now(),
                        returned: returned.clone(),
                    };
                    pipeline.state.completed_steps += 1;
                    self.emit_event(ExecutionEvent::StepCompleted {
                        index,
                        task_name,
                        returned,
                    })
                    .await;
                }
                Err(AtomError::NoDiscovery(reason)) => {
                    warn!(
                        "{}: no discoverable data ({}); skipping remaining steps",
                        task_name, reason
                    );
                    step.state = StepState::Halted {
                        reason: reason.clone(),
                    };
                    halted_at = Some(index);
                    self.emit_event(ExecutionEvent::PipelineHalted {
                        index,
                        task_name,
                        reason,
                    })
                    .await;
                }
                Err(source) => {
                    error!("Step {} ({}) failed: {}", index, task_name, source);
                    step.state = StepState::Failed {
                        error: source.to_string(),
                        failed_at: chrono::Utc::now(),
                    };
                    pipeline.state.fail();
                    self.emit_event(ExecutionEvent::StepFailed {
                        index,
                        task_name: task_name.clone(),
                        error: source.to_string(),
                    })
                    .await;
                    self.emit_event(ExecutionEvent::PipelineCompleted {
                        execution_id,
                        status: ExecutionStatus::Failed,
                    })
                    .await;
                    return Err(PipelineError::Step {
                        step: index,
                        task_name,
                        source,
                    });
                }
            }
        }

        if halted_at.is_some() {
            pipeline.state.halt();
        } else {
            pipeline.state.complete();
        }
        let status = pipeline.state.status;

        info!("Pipeline execution finished: {} - {:?}", pipeline.name, status);
        self.emit_event(ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
        })
        .await;

        Ok(RunOutcome {
            execution_id,
            status,
            returns,
            restricted,
            halted_at,
        })
    }
}

impl Default for ExecutionEngine {
    fn default() -> Self {
        Self::new()
    }
}
