//! Change watcher: maps file-system changes to single rebuild actions
//!
//! Every change is classified against an ordered rule list and produces at
//! most one action. Failed re-runs are logged; the session keeps going.

use crate::core::config::Config;
use crate::core::fileset::{url_path, FileQuery};
use crate::execution::TaskExecutor;
use crate::server::{Reload, ReloadNotifier};
use crate::tasks::transform_task::{image_sources, page_templates, script_sources, style_sources};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Error types for watching
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Failed to watch {}: {source}", .path.display())]
    Notify {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("Invalid watch pattern: {0}")]
    Glob(#[from] globset::Error),
}

/// What a matching change triggers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchAction {
    /// Re-run one task
    Run(String),

    /// Tell clients to reload the page
    Reload,

    /// Push the changed page's body to clients
    InjectHtml,
}

#[derive(Debug, Clone)]
pub struct WatchRule {
    pub query: FileQuery,
    pub action: WatchAction,
}

/// Ordered rules; the first match wins
#[derive(Debug, Clone)]
pub struct WatchRules {
    rules: Vec<WatchRule>,
    /// Directory that InjectHtml paths are served from
    served_root: PathBuf,
}

impl WatchRules {
    /// Rules for the dev server
    pub fn dev(config: &Config) -> Result<Self, WatchError> {
        let rules = vec![
            WatchRule {
                query: image_sources(config)?,
                action: WatchAction::Reload,
            },
            WatchRule {
                query: style_sources(config)?,
                action: WatchAction::Run("styles".to_string()),
            },
            WatchRule {
                query: script_sources(config)?,
                action: WatchAction::Run("scripts".to_string()),
            },
            WatchRule {
                query: page_templates(config)?,
                action: WatchAction::Run("pages".to_string()),
            },
            WatchRule {
                query: FileQuery::new(&config.temp, &["*.html"])?.max_depth(1),
                action: WatchAction::InjectHtml,
            },
        ];
        Ok(Self {
            rules,
            served_root: config.temp.clone(),
        })
    }

    /// Rules for serving the output directory: any change reloads
    pub fn static_output(config: &Config) -> Result<Self, WatchError> {
        Ok(Self {
            rules: vec![WatchRule {
                query: FileQuery::new(&config.output, &["**/*"])?.dot(true),
                action: WatchAction::Reload,
            }],
            served_root: config.output.clone(),
        })
    }

    /// Action for a changed absolute path
    pub fn classify(&self, path: &Path) -> Option<&WatchAction> {
        self.rules
            .iter()
            .find(|rule| rule.query.matches(path))
            .map(|rule| &rule.action)
    }
}

/// Recursive notify watch delivering changed paths into the event loop
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<PathBuf>,
}

impl ChangeWatcher {
    pub fn new(root: &Path) -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::channel(256);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!("Watch error: {}", e);
                    return;
                }
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            for path in event.paths {
                // Receiver gone means the session is over
                if tx.blocking_send(path).is_err() {
                    return;
                }
            }
        })
        .map_err(|source| WatchError::Notify {
            path: root.to_path_buf(),
            source,
        })?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|source| WatchError::Notify {
                path: root.to_path_buf(),
                source,
            })?;

        Ok(Self {
            _watcher: watcher,
            rx,
        })
    }

    /// Next changed path; `None` once the watcher shut down
    pub async fn next(&mut self) -> Option<PathBuf> {
        self.rx.recv().await
    }
}

/// Applies watch rules to incoming changes
pub struct WatchDispatcher {
    rules: WatchRules,
    executor: Arc<TaskExecutor>,
    notifier: Arc<dyn ReloadNotifier>,
}

impl WatchDispatcher {
    pub fn new(
        rules: WatchRules,
        executor: Arc<TaskExecutor>,
        notifier: Arc<dyn ReloadNotifier>,
    ) -> Self {
        Self {
            rules,
            executor,
            notifier,
        }
    }

    /// Handle one changed path, returning the action taken
    pub async fn dispatch(&self, path: &Path) -> Option<WatchAction> {
        let action = self.rules.classify(path)?.clone();
        debug!("{} -> {:?}", path.display(), action);

        match &action {
            WatchAction::Run(task) => match self.executor.execute(task).await {
                Ok(report) => info!(
                    "{} rebuilt ({} file(s))",
                    task,
                    report.files_written.len()
                ),
                Err(e) => error!("{} failed: {}", task, e),
            },
            WatchAction::Reload => self.notifier.notify(Reload::Full),
            WatchAction::InjectHtml => self.inject(path).await,
        }

        Some(action)
    }

    async fn inject(&self, path: &Path) {
        let document = match tokio::fs::read_to_string(path).await {
            Ok(document) => document,
            Err(e) => {
                debug!("Skipping injection for {}: {}", path.display(), e);
                return;
            }
        };
        let rel = path.strip_prefix(&self.rules.served_root).unwrap_or(path);
        self.notifier.notify(Reload::html(url_path(rel), &document));
    }

    /// Dispatch changes until the watcher shuts down
    pub async fn run(self, mut watcher: ChangeWatcher) {
        while let Some(path) = watcher.next().await {
            self.dispatch(&path).await;
        }
        info!("Watcher stopped");
    }
}
