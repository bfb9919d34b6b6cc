//! Git transport: stages the output tree in a cached clone and pushes it

use super::{DeployError, PublishOutcome, PublishRequest, Publisher};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Publishes by shelling out to `git`
#[derive(Debug, Clone)]
pub struct GitPublisher {
    /// Path to git executable
    git_path: String,
}

impl Default for GitPublisher {
    fn default() -> Self {
        Self::new("git")
    }
}

impl GitPublisher {
    pub fn new(git_path: impl Into<String>) -> Self {
        Self {
            git_path: git_path.into(),
        }
    }

    /// Run git in `dir`, returning trimmed stdout
    ///
    /// A non-zero exit is reported with the command line, exit code and
    /// stderr exactly as git printed them.
    async fn git(&self, dir: &Path, args: &[&str]) -> Result<String, DeployError> {
        debug!("git {} (in {})", args.join(" "), dir.display());

        let output = Command::new(&self.git_path)
            .args(args)
            .current_dir(dir)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(DeployError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let code = output.status.code().unwrap_or(-1);
            warn!("git {} exited with code {}: {}", args.join(" "), code, stderr);
            return Err(DeployError::Git {
                command: args.join(" "),
                code,
                stderr,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Make sure `cache` is a repository pointing at `remote`
    async fn prepare_cache(&self, cache: &Path, remote: &str) -> Result<(), DeployError> {
        if cache.join(".git").is_dir() {
            self.git(cache, &["remote", "set-url", "origin", remote]).await?;
            return Ok(());
        }

        tokio::fs::create_dir_all(cache)
            .await
            .map_err(|source| io_error("create", cache, source))?;
        self.git(cache, &["init", "--quiet"]).await?;
        self.git(cache, &["remote", "add", "origin", remote]).await?;
        Ok(())
    }

    /// Point HEAD at the branch, starting from the remote tip when it exists
    async fn checkout_branch(&self, cache: &Path, branch: &str) -> Result<(), DeployError> {
        let heads = self
            .git(cache, &["ls-remote", "--heads", "origin", branch])
            .await?;

        if heads.is_empty() {
            info!("Branch '{}' does not exist on the remote yet", branch);
            let head = format!("refs/heads/{}", branch);
            self.git(cache, &["symbolic-ref", "HEAD", &head]).await?;
            return Ok(());
        }

        self.git(cache, &["fetch", "--quiet", "origin", branch]).await?;
        self.git(cache, &["checkout", "--quiet", "--force", "-B", branch, "FETCH_HEAD"])
            .await?;
        Ok(())
    }

    fn commit_args<'a>(request: &'a PublishRequest, identity: &'a [String]) -> Vec<&'a str> {
        let mut args: Vec<&str> = identity.iter().map(|s| s.as_str()).collect();
        args.extend(["commit", "--quiet", "-m", request.message.as_str()]);
        args
    }
}

#[async_trait]
impl Publisher for GitPublisher {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, DeployError> {
        if !request.source.is_dir() {
            return Err(DeployError::MissingOutput(request.source.clone()));
        }

        let cache = &request.cache_dir;
        self.prepare_cache(cache, &request.remote).await?;
        self.checkout_branch(cache, &request.branch).await?;

        clear_worktree(cache).await?;
        let copied = copy_tree(&request.source, cache).await?;
        debug!("Staged {} file(s) in {}", copied, cache.display());

        self.git(cache, &["add", "--all"]).await?;
        let status = self.git(cache, &["status", "--porcelain"]).await?;
        if status.is_empty() {
            return Ok(PublishOutcome::Unchanged);
        }

        let identity: Vec<String> = match &request.user {
            Some(user) => vec![
                "-c".to_string(),
                format!("user.name={}", user.name),
                "-c".to_string(),
                format!("user.email={}", user.email),
            ],
            None => Vec::new(),
        };
        self.git(cache, &Self::commit_args(request, &identity)).await?;

        let refspec = format!("HEAD:refs/heads/{}", request.branch);
        self.git(cache, &["push", "--quiet", "origin", &refspec]).await?;

        let commit = self.git(cache, &["rev-parse", "HEAD"]).await?;
        Ok(PublishOutcome::Pushed { commit })
    }
}

fn io_error(action: &'static str, path: &Path, source: std::io::Error) -> DeployError {
    DeployError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// Remove everything in the clone except `.git`
async fn clear_worktree(cache: &Path) -> Result<(), DeployError> {
    let mut entries = tokio::fs::read_dir(cache)
        .await
        .map_err(|source| io_error("read", cache, source))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| io_error("read", cache, source))?
    {
        if entry.file_name() == ".git" {
            continue;
        }
        let path = entry.path();
        let result = if entry
            .file_type()
            .await
            .map_err(|source| io_error("inspect", &path, source))?
            .is_dir()
        {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        result.map_err(|source| io_error("remove", &path, source))?;
    }
    Ok(())
}

/// Copy every file under `from` into `to`, returning the count
async fn copy_tree(from: &Path, to: &Path) -> Result<usize, DeployError> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(from).to_path_buf();
            io_error("walk", &path, std::io::Error::from(e))
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    for file in &files {
        let rel = file.strip_prefix(from).unwrap_or(file);
        let target = to.join(rel);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error("create", parent, source))?;
        }
        tokio::fs::copy(file, &target)
            .await
            .map_err(|source| io_error("copy", file, source))?;
    }
    Ok(files.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::DeployUser;
    use std::fs;
    use tempfile::TempDir;

    fn git_available() -> bool {
        std::process::Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn bare_remote(dir: &Path) -> PathBuf {
        let remote = dir.join("remote.git");
        let status = std::process::Command::new("git")
            .args(["init", "--bare", "--quiet"])
            .arg(&remote)
            .status()
            .unwrap();
        assert!(status.success());
        remote
    }

    fn request(dir: &Path, remote: &Path) -> PublishRequest {
        PublishRequest {
            source: dir.join("dist"),
            remote: remote.to_string_lossy().into_owned(),
            branch: "gh-pages".to_string(),
            cache_dir: dir.join("cache"),
            message: "Update site".to_string(),
            user: Some(DeployUser {
                name: "Site Bot".to_string(),
                email: "bot@example.com".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn test_missing_output_is_reported() {
        let dir = TempDir::new().unwrap();
        let req = request(dir.path(), Path::new("/nowhere.git"));
        let err = GitPublisher::default().publish(&req).await.unwrap_err();
        assert!(matches!(err, DeployError::MissingOutput(_)));
    }

    #[tokio::test]
    async fn test_copy_tree_reports_walk_errors() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dist/assets")).unwrap();
        fs::write(dir.path().join("dist/assets/site.css"), "a{}").unwrap();

        let copied = copy_tree(&dir.path().join("dist"), &dir.path().join("cache"))
            .await
            .unwrap();
        assert_eq!(copied, 1);
        assert!(dir.path().join("cache/assets/site.css").exists());

        let err = copy_tree(&dir.path().join("gone"), &dir.path().join("cache"))
            .await
            .unwrap_err();
        match err {
            DeployError::Io { action, path, .. } => {
                assert_eq!(action, "walk");
                assert_eq!(path, dir.path().join("gone"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_publish_then_unchanged() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let remote = bare_remote(dir.path());
        fs::create_dir_all(dir.path().join("dist/assets")).unwrap();
        fs::write(dir.path().join("dist/index.html"), "<h1>hi</h1>").unwrap();
        fs::write(dir.path().join("dist/assets/site.css"), "a{}").unwrap();

        let publisher = GitPublisher::default();
        let req = request(dir.path(), &remote);

        let first = publisher.publish(&req).await.unwrap();
        assert!(matches!(first, PublishOutcome::Pushed { .. }));

        // Second deploy reuses the clone and finds nothing new
        let second = publisher.publish(&req).await.unwrap();
        assert_eq!(second, PublishOutcome::Unchanged);

        fs::remove_file(dir.path().join("dist/assets/site.css")).unwrap();
        let third = publisher.publish(&req).await.unwrap();
        assert!(matches!(third, PublishOutcome::Pushed { .. }));
        assert!(!dir.path().join("cache/assets/site.css").exists());
    }

    #[tokio::test]
    async fn test_git_failure_carries_exit_code_and_stderr() {
        if !git_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/index.html"), "x").unwrap();

        let req = request(dir.path(), &dir.path().join("missing.git"));
        let err = GitPublisher::default().publish(&req).await.unwrap_err();
        match err {
            DeployError::Git { command, code, stderr } => {
                assert!(command.starts_with("ls-remote"));
                assert_ne!(code, 0);
                assert!(!stderr.is_empty());
            }
            other => panic!("unexpected error: {}", other),
        }
    }
}
