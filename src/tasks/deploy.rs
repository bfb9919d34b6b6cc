//! Push the output tree to the configured remote branch

use super::{Task, TaskContext, TaskError, TaskReport};
use crate::deploy::{DeployError, PublishOutcome, PublishRequest, Publisher};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

pub struct DeployTask {
    publisher: Arc<dyn Publisher>,
}

impl DeployTask {
    pub fn new(publisher: Arc<dyn Publisher>) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl Task for DeployTask {
    fn name(&self) -> &str {
        "deploy"
    }

    fn description(&self) -> &str {
        "Publish the output directory to the deploy branch"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let config = &ctx.config;
        let remote = config.remote.clone().ok_or(DeployError::MissingRemote)?;

        let request = PublishRequest {
            source: config.output.clone(),
            remote,
            branch: config.branch.clone(),
            cache_dir: config.deploy_cache.clone(),
            message: config
                .deploy_message
                .clone()
                .unwrap_or_else(|| format!("Updates {}", Utc::now().to_rfc3339())),
            user: config.deploy_user.clone(),
        };

        match self.publisher.publish(&request).await? {
            PublishOutcome::Pushed { commit } => {
                info!("Pushed {} to {} ({})", request.branch, request.remote, commit);
                Ok(TaskReport::note(format!("pushed {}", commit)))
            }
            PublishOutcome::Unchanged => {
                info!("{} is already up to date", request.branch);
                Ok(TaskReport::note("already up to date"))
            }
        }
    }
}
