//! Publishing the output tree to a static hosting branch

pub mod git;

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

pub use git::GitPublisher;

use crate::core::config::DeployUser;

/// Error types for deployment
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("No deploy remote configured; set deploy.remote in the config file")]
    MissingRemote,

    #[error("Nothing to deploy: {} does not exist", .0.display())]
    MissingOutput(PathBuf),

    #[error("`git {command}` exited with code {code}: {stderr}")]
    Git {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to {action} {}: {source}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What to publish and where
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Directory whose contents become the branch tree
    pub source: PathBuf,

    /// Remote repository URL
    pub remote: String,

    /// Branch receiving the tree
    pub branch: String,

    /// Reusable local clone
    pub cache_dir: PathBuf,

    /// Commit message
    pub message: String,

    /// Commit identity
    pub user: Option<DeployUser>,
}

/// Result of a publish
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A new commit was pushed
    Pushed { commit: String },

    /// The branch already holds this exact tree
    Unchanged,
}

/// Trait for publishers - allows swapping the transport in tests
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> Result<PublishOutcome, DeployError>;
}
