//! Main execution engine - runs a task graph to one terminal result

use crate::core::{
    graph::{GraphError, TaskGraph},
    state::{ExecutionStatus, TaskState},
};
use crate::execution::TaskExecutor;
use crate::tasks::{TaskError, TaskReport};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Errors that end a run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid run plan: {0}")]
    Graph(#[from] GraphError),

    #[error("Run plan references unknown task '{0}'")]
    UnknownTask(String),

    #[error("Task '{task}' failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: TaskError,
    },
}

impl PipelineError {
    /// Name of the failed task, if a task failed
    pub fn task(&self) -> Option<&str> {
        match self {
            PipelineError::TaskFailed { task, .. } => Some(task),
            _ => None,
        }
    }
}

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        run_id: Uuid,
        name: String,
        total_tasks: usize,
    },
    TaskStarted {
        task: String,
    },
    TaskCompleted {
        task: String,
        files_written: usize,
        note: Option<String>,
        elapsed_ms: i64,
    },
    TaskFailed {
        task: String,
        error: String,
    },
    /// Never started because an earlier task failed
    TaskSkipped {
        task: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: ExecutionStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

type Finished = (String, Result<TaskReport, TaskError>);

/// Drives a task graph through a [`TaskExecutor`]
///
/// Every ready task is started at once and runs concurrently.
/// The first failure stops new tasks from starting; tasks already in
/// flight run to completion and their outcome is recorded.
pub struct ExecutionEngine {
    executor: Arc<TaskExecutor>,
    event_handlers: Vec<EventHandler>,
}

impl ExecutionEngine {
    pub fn new(executor: Arc<TaskExecutor>) -> Self {
        Self {
            executor,
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    pub fn executor(&self) -> &Arc<TaskExecutor> {
        &self.executor
    }

    /// Emit an event to all handlers
    fn emit(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Run the whole graph
    pub async fn execute(&self, graph: &mut TaskGraph) -> Result<(), PipelineError> {
        graph.validate()?;
        if let Some(missing) = graph
            .names()
            .iter()
            .find(|name| !self.executor.registry().contains(name))
        {
            return Err(PipelineError::UnknownTask(missing.clone()));
        }

        let run_id = graph.state.run_id;
        info!("Starting run: {} ({})", graph.name, run_id);
        graph.state.start(graph.len());
        self.emit(ExecutionEvent::RunStarted {
            run_id,
            name: graph.name.clone(),
            total_tasks: graph.len(),
        });

        let mut in_flight: JoinSet<Finished> = JoinSet::new();
        let mut first_failure: Option<(String, TaskError)> = None;
        let mut lost: Option<String> = None;

        loop {
            if first_failure.is_none() && lost.is_none() {
                let ready: Vec<String> = graph.ready_tasks().iter().map(|n| n.name.clone()).collect();
                for name in ready {
                    self.start_task(graph, &name, &mut in_flight);
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };

            // A panicking task surfaces as an error result inside its wrapper;
            // a join error here means the wrapper itself was lost
            let (name, result) = match joined {
                Ok(finished) => finished,
                Err(e) => {
                    error!("Task wrapper aborted: {}", e);
                    lost.get_or_insert_with(|| e.to_string());
                    continue;
                }
            };

            match result {
                Ok(report) => self.mark_completed(graph, &name, report),
                Err(e) => {
                    self.mark_failed(graph, &name, &e);
                    if first_failure.is_none() {
                        first_failure = Some((name, e));
                    } else {
                        warn!("Task {} also failed while the run was stopping", name);
                    }
                }
            }
            graph.refresh_counts();
        }

        if let Some(reason) = lost {
            self.fail_stranded(graph, &reason, &mut first_failure);
        }
        self.skip_pending(graph);
        graph.refresh_counts();

        if let Some((task, source)) = first_failure {
            graph.state.fail();
            info!("Run failed: {} - task {}", graph.name, task);
            self.emit(ExecutionEvent::RunCompleted {
                run_id,
                status: ExecutionStatus::Failed,
            });
            return Err(PipelineError::TaskFailed { task, source });
        }

        graph.state.complete();
        info!("Run finished: {}", graph.name);
        self.emit(ExecutionEvent::RunCompleted {
            run_id,
            status: ExecutionStatus::Completed,
        });
        Ok(())
    }

    fn start_task(&self, graph: &mut TaskGraph, name: &str, in_flight: &mut JoinSet<Finished>) {
        if let Some(node) = graph.node_mut(name) {
            node.state = TaskState::Running {
                started_at: Utc::now(),
            };
        }
        self.emit(ExecutionEvent::TaskStarted {
            task: name.to_string(),
        });

        let executor = Arc::clone(&self.executor);
        let task_name = name.to_string();
        let inner = tokio::spawn(async move { executor.execute(&task_name).await });

        let name = name.to_string();
        in_flight.spawn(async move {
            let result = match inner.await {
                Ok(result) => result,
                Err(e) => Err(TaskError::Panicked(e.to_string())),
            };
            (name, result)
        });
    }

    fn mark_completed(&self, graph: &mut TaskGraph, name: &str, report: TaskReport) {
        let Some(node) = graph.node_mut(name) else {
            return;
        };
        let started_at = node.state.started_at().unwrap_or_else(Utc::now);
        let completed_at = Utc::now();
        node.state = TaskState::Completed {
            files_written: report.files_written.len(),
            started_at,
            completed_at,
        };
        debug!("Task {} completed", name);

        self.emit(ExecutionEvent::TaskCompleted {
            task: name.to_string(),
            files_written: report.files_written.len(),
            note: report.note,
            elapsed_ms: (completed_at - started_at).num_milliseconds(),
        });
    }

    fn mark_failed(&self, graph: &mut TaskGraph, name: &str, e: &TaskError) {
        if let Some(node) = graph.node_mut(name) {
            let started_at = node.state.started_at().unwrap_or_else(Utc::now);
            node.state = TaskState::Failed {
                error: e.to_string(),
                started_at,
                failed_at: Utc::now(),
            };
        }
        self.emit(ExecutionEvent::TaskFailed {
            task: name.to_string(),
            error: e.to_string(),
        });
    }

    /// Fail every task still marked running once the join set is drained
    fn fail_stranded(
        &self,
        graph: &mut TaskGraph,
        reason: &str,
        first_failure: &mut Option<(String, TaskError)>,
    ) {
        let stranded: Vec<String> = graph.running_tasks().iter().map(|n| n.name.clone()).collect();

        for name in stranded {
            let e = TaskError::Panicked(reason.to_string());
            self.mark_failed(graph, &name, &e);
            if first_failure.is_none() {
                *first_failure = Some((name, e));
            }
        }
    }

    fn skip_pending(&self, graph: &mut TaskGraph) {
        let pending: Vec<String> = graph
            .nodes()
            .filter(|n| matches!(n.state, TaskState::Pending))
            .map(|n| n.name.clone())
            .collect();

        for name in pending {
            if let Some(node) = graph.node_mut(&name) {
                node.state = TaskState::Skipped {
                    reason: "an earlier task failed".to_string(),
                };
            }
            self.emit(ExecutionEvent::TaskSkipped { task: name });
        }
    }
}
