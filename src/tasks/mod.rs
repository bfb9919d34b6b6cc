//! Named units of work and the registry that resolves them
//!
//! Every CLI command maps to a task graph (see [`catalog`]) whose nodes are
//! resolved against a [`TaskRegistry`] at run time.

pub mod catalog;
pub mod clean;
pub mod deploy;
pub mod extras;
pub mod init;
pub mod transform_task;

use crate::core::config::Config;
use crate::deploy::{DeployError, GitPublisher, Publisher};
use crate::server::{NoopNotifier, ReloadNotifier};
use crate::transform::TransformError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use clean::CleanTask;
pub use deploy::DeployTask;
pub use extras::ExtrasTask;
pub use init::InitTask;
pub use transform_task::{SideEffect, TransformTask};

/// Error types for task execution
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("Invalid glob: {0}")]
    Glob(#[from] globset::Error),

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown task '{0}'")]
    Unknown(String),

    #[error("Task '{0}' panicked")]
    Panicked(String),
}

impl TaskError {
    pub fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        TaskError::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// What a finished task produced
#[derive(Debug, Clone, Default)]
pub struct TaskReport {
    /// Files written, as absolute paths
    pub files_written: Vec<PathBuf>,

    /// One-line note for the user (e.g. a skipped precondition)
    pub note: Option<String>,
}

impl TaskReport {
    pub fn written(files: Vec<PathBuf>) -> Self {
        Self {
            files_written: files,
            note: None,
        }
    }

    pub fn note(note: impl Into<String>) -> Self {
        Self {
            files_written: Vec::new(),
            note: Some(note.into()),
        }
    }
}

/// Everything a task may touch while running
#[derive(Clone)]
pub struct TaskContext {
    pub config: Arc<Config>,
    pub notifier: Arc<dyn ReloadNotifier>,
}

impl TaskContext {
    pub fn new(config: Arc<Config>, notifier: Arc<dyn ReloadNotifier>) -> Self {
        Self { config, notifier }
    }

    /// Context for runs without a dev server
    pub fn offline(config: Arc<Config>) -> Self {
        Self::new(config, Arc::new(NoopNotifier))
    }
}

/// A named unit of work
#[async_trait]
pub trait Task: Send + Sync {
    fn name(&self) -> &str;

    /// One-line summary for `tasks`
    fn description(&self) -> &str;

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError>;
}

/// Task lookup by name
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in catalog, wired from the resolved configuration
    pub fn standard(config: &Arc<Config>) -> Result<Self, TaskError> {
        Self::with_publisher(config, Arc::new(GitPublisher::default()))
    }

    /// The built-in catalog with a custom deploy transport
    pub fn with_publisher(
        config: &Arc<Config>,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, TaskError> {
        let mut registry = Self::new();
        registry.register(TransformTask::styles(config)?);
        registry.register(TransformTask::scripts(config)?);
        registry.register(TransformTask::pages(config)?);
        registry.register(TransformTask::images(config)?);
        registry.register(CleanTask);
        registry.register(ExtrasTask);
        registry.register(InitTask);
        registry.register(DeployTask::new(publisher));
        Ok(registry)
    }

    /// Add or replace a task
    pub fn register(&mut self, task: impl Task + 'static) {
        self.tasks.insert(task.name().to_string(), Arc::new(task));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }
}
