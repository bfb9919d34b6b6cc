//! siteflow - a task runner for static web projects

pub mod cli;
pub mod core;
pub mod deploy;
pub mod execution;
pub mod server;
pub mod tasks;
pub mod transform;
pub mod watch;

// Re-export commonly used types
pub use crate::core::{BuildMode, Config, ExecutionStatus, SiteConfig, TaskGraph};
pub use execution::{ExecutionEngine, ExecutionEvent, PipelineError, TaskExecutor};
pub use server::{LiveReload, Reload, ReloadNotifier};
pub use tasks::{Task, TaskContext, TaskError, TaskRegistry, TaskReport};
pub use watch::{WatchAction, WatchDispatcher, WatchRules};
