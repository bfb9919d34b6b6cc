//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Run has not started
    Pending,
    /// Run is in progress
    Running,
    /// Every task completed
    Completed,
    /// A task failed and the run was aborted
    Failed,
}

/// State of a single task within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskState {
    /// Waiting for dependencies
    Pending,
    /// Task is running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Task completed successfully
    Completed {
        files_written: usize,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Task failed
    Failed {
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Task never started because the run was aborted
    Skipped {
        reason: String,
    },
}

impl TaskState {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskState::Completed { .. })
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running { .. })
    }

    /// When the task started, if it did
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskState::Running { started_at }
            | TaskState::Completed { started_at, .. }
            | TaskState::Failed { started_at, .. } => Some(*started_at),
            _ => None,
        }
    }
}

/// State of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Current status
    pub status: ExecutionStatus,

    /// When the run started
    pub started_at: Option<DateTime<Utc>>,

    /// When the run completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of tasks
    pub total_tasks: usize,

    /// Number of completed tasks
    pub completed_tasks: usize,

    /// Number of failed tasks
    pub failed_tasks: usize,

    /// Number of currently running tasks
    pub running_tasks: usize,
}

impl RunState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            status: ExecutionStatus::Pending,
            started_at: None,
            completed_at: None,
            total_tasks: 0,
            completed_tasks: 0,
            failed_tasks: 0,
            running_tasks: 0,
        }
    }

    /// Mark run as started
    pub fn start(&mut self, total_tasks: usize) {
        self.status = ExecutionStatus::Running;
        self.started_at = Some(Utc::now());
        self.total_tasks = total_tasks;
    }

    /// Mark run as completed
    pub fn complete(&mut self) {
        self.status = ExecutionStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Mark run as failed
    pub fn fail(&mut self) {
        self.status = ExecutionStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    pub fn update_counts(&mut self, completed: usize, failed: usize, running: usize) {
        self.completed_tasks = completed;
        self.failed_tasks = failed;
        self.running_tasks = running;
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
