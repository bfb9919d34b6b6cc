//! Run execution: running and reporting task graphs

pub mod engine;
pub mod executor;

pub use engine::{EventHandler, ExecutionEngine, ExecutionEvent, PipelineError};
pub use executor::TaskExecutor;
