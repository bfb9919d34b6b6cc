//! Core domain models
//!
//! Configuration, build modes, file sets and the task graph that every
//! other layer builds on.

pub mod condition;
pub mod config;
pub mod fileset;
pub mod graph;
pub mod state;

pub use condition::{BuildMode, When};
pub use config::{Config, ConfigOverrides, SiteConfig};
pub use fileset::{FileQuery, FileSet, SourceFile};
pub use graph::{GraphError, TaskGraph, TaskNode};
pub use state::*;
