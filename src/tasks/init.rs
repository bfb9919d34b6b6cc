//! Scaffold a new project from the bundled skeleton

use super::{Task, TaskContext, TaskError, TaskReport};
use async_trait::async_trait;
use rust_embed::RustEmbed;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(RustEmbed)]
#[folder = "skeleton/"]
struct Skeleton;

/// Prefix standing in for a leading dot in bundled file names
const DOT_PREFIX: &str = "dot-";

/// Target path of a bundled file: `dot-gitignore` becomes `.gitignore`
fn target_path(name: &str) -> PathBuf {
    name.split('/')
        .map(|segment| match segment.strip_prefix(DOT_PREFIX) {
            Some(rest) => format!(".{}", rest),
            None => segment.to_string(),
        })
        .collect()
}

/// Relative paths of every bundled file, as they land on disk
pub fn skeleton_files() -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Skeleton::iter().map(|name| target_path(&name)).collect();
    files.sort();
    files
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InitTask;

impl InitTask {
    async fn is_empty(dir: &Path) -> Result<bool, TaskError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(TaskError::io("read", dir, e)),
        };
        let first = entries
            .next_entry()
            .await
            .map_err(|e| TaskError::io("read", dir, e))?;
        Ok(first.is_none())
    }
}

#[async_trait]
impl Task for InitTask {
    fn name(&self) -> &str {
        "init"
    }

    fn description(&self) -> &str {
        "Create a new project in an empty directory"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let cwd = &ctx.config.cwd;
        if !Self::is_empty(cwd).await? {
            warn!("{} is not empty, nothing was written", cwd.display());
            return Ok(TaskReport::note(format!("{} is not empty", cwd.display())));
        }

        let output = ctx.config.output_relative();
        let mut written = Vec::new();

        for name in Skeleton::iter() {
            let rel = target_path(&name);
            if rel.starts_with(output) {
                debug!("Skipping {} inside the output directory", rel.display());
                continue;
            }
            let Some(file) = Skeleton::get(&name) else {
                continue;
            };

            let target = cwd.join(&rel);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| TaskError::io("create", parent, e))?;
            }
            tokio::fs::write(&target, file.data.as_ref())
                .await
                .map_err(|e| TaskError::io("write", &target, e))?;
            written.push(target);
        }

        written.sort();
        Ok(TaskReport::written(written))
    }
}
