//! Assemble the output tree from compiled intermediates and static files

use super::transform_task::IMAGE_EXTENSIONS;
use super::{Task, TaskContext, TaskError, TaskReport};
use crate::core::config::Config;
use crate::core::fileset::{FileQuery, FileSet};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Patterns produced by other tasks, never copied verbatim from the project root
const COMPILED_SOURCES: [&str; 3] = ["**/*.html", "**/*.js", "**/*.scss"];

/// Everything in the temp directory
pub fn compiled_files(config: &Config) -> Result<FileQuery, globset::Error> {
    FileQuery::new(&config.temp, &["**/*"])
}

/// Static project files: everything that is not a source of another task,
/// outside temp and output, and not excluded by the user
pub fn static_files(config: &Config) -> Result<FileQuery, globset::Error> {
    let mut exclude: Vec<String> = COMPILED_SOURCES.iter().map(|p| p.to_string()).collect();
    exclude.push(format!("**/*.{}", IMAGE_EXTENSIONS));
    exclude.extend(config.exclude.iter().cloned());

    Ok(FileQuery::new(&config.cwd, &["**/*"])?
        .exclude(&exclude)?
        .prune(&config.temp)
        .prune(&config.output))
}

async fn copy(query: FileQuery, dest: PathBuf) -> Result<Vec<PathBuf>, TaskError> {
    let files = FileSet::read(&query)
        .await
        .map_err(|e| TaskError::io("read", query.root(), e))?;
    files
        .write_to(&dest)
        .await
        .map_err(|e| TaskError::io("write", &dest, e))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtrasTask;

#[async_trait]
impl Task for ExtrasTask {
    fn name(&self) -> &str {
        "extras"
    }

    fn description(&self) -> &str {
        "Copy compiled and static files into the output directory"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let config = &ctx.config;
        let compiled = compiled_files(config)?;
        let statics = static_files(config)?;

        // Both passes finish before either result is inspected
        let (compiled, statics) = tokio::join!(
            copy(compiled, config.output.clone()),
            copy(statics, config.output.clone())
        );
        let mut written = compiled?;
        let statics = statics?;
        debug!("extras: {} compiled, {} static", written.len(), statics.len());

        written.extend(statics);
        Ok(TaskReport::written(written))
    }
}
