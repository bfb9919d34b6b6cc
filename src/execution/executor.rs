//! Task executor - runs a single named task against the registry

use crate::tasks::{TaskContext, TaskError, TaskRegistry, TaskReport};
use std::time::Instant;
use tracing::debug;

/// Resolves and runs tasks by name
///
/// Shared by the engine (whole graphs) and the change watcher (single
/// re-runs).
pub struct TaskExecutor {
    registry: TaskRegistry,
    ctx: TaskContext,
}

impl TaskExecutor {
    pub fn new(registry: TaskRegistry, ctx: TaskContext) -> Self {
        Self { registry, ctx }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn context(&self) -> &TaskContext {
        &self.ctx
    }

    /// Run one task to completion
    pub async fn execute(&self, name: &str) -> Result<TaskReport, TaskError> {
        let task = self
            .registry
            .get(name)
            .ok_or_else(|| TaskError::Unknown(name.to_string()))?;

        debug!("Running task: {}", name);
        let started = Instant::now();
        let result = task.run(&self.ctx).await;

        match &result {
            Ok(report) => debug!(
                "Task {} wrote {} file(s) in {:?}",
                name,
                report.files_written.len(),
                started.elapsed()
            ),
            Err(e) => debug!("Task {} failed after {:?}: {}", name, started.elapsed(), e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use std::path::Path;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_unknown_task() {
        let ctx = TaskContext::offline(Arc::new(Config::with_defaults(Path::new("/site"))));
        let executor = TaskExecutor::new(TaskRegistry::new(), ctx);

        let err = executor.execute("lint").await.unwrap_err();
        assert!(matches!(err, TaskError::Unknown(name) if name == "lint"));
    }
}
