//! Remove the output and intermediate directories

use super::{Task, TaskContext, TaskError, TaskReport};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanTask;

async fn remove_tree(dir: &Path) -> Result<(), TaskError> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => debug!("Removed {}", dir.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => debug!("{} already absent", dir.display()),
        Err(e) => return Err(TaskError::io("remove", dir, e)),
    }
    Ok(())
}

#[async_trait]
impl Task for CleanTask {
    fn name(&self) -> &str {
        "clean"
    }

    fn description(&self) -> &str {
        "Delete the output and temp directories"
    }

    // Extras copies all of temp into output, so temp must not outlive a clean
    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        remove_tree(&ctx.config.output).await?;
        remove_tree(&ctx.config.temp).await?;
        Ok(TaskReport::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clean_removes_output_and_temp() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dist/assets")).unwrap();
        fs::write(dir.path().join("dist/assets/old.css"), "a{}").unwrap();
        fs::create_dir_all(dir.path().join(".tmp/assets/js")).unwrap();
        fs::write(dir.path().join(".tmp/assets/js/old.js.map"), "{}").unwrap();
        fs::write(dir.path().join("index.html"), "<p></p>").unwrap();

        let ctx = TaskContext::offline(Arc::new(Config::with_defaults(dir.path())));
        CleanTask.run(&ctx).await.unwrap();

        assert!(!dir.path().join("dist").exists());
        assert!(!dir.path().join(".tmp").exists());
        assert!(dir.path().join("index.html").exists());
    }

    #[tokio::test]
    async fn test_clean_without_output_succeeds() {
        let dir = TempDir::new().unwrap();
        let ctx = TaskContext::offline(Arc::new(Config::with_defaults(dir.path())));
        assert!(CleanTask.run(&ctx).await.is_ok());
    }
}
