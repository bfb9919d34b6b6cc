//! Transform capabilities and the conditional chains that sequence them
//!
//! A transform maps a file set to a new file set. Chains pair every
//! transform with a [`When`] predicate that is evaluated once per
//! invocation against the build mode; a step whose predicate does not
//! hold is an identity pass.

pub mod image;
pub mod page;
pub mod script;
pub mod sourcemap;
pub mod style;

use crate::core::condition::{BuildMode, When};
use crate::core::fileset::FileSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

pub use image::PngOptimize;
pub use page::{HtmlMinify, TemplateRender};
pub use script::JsMinify;
pub use sourcemap::{SourceMapInit, SourceMapWrite};
pub use style::{Autoprefix, CssMinify, RenameSegments, SassCompile};

/// Errors raised by a transform
#[derive(Debug, Error)]
pub enum TransformError {
    /// Malformed input file
    #[error("{transform}: {}: {message}", .path.display())]
    Input {
        transform: String,
        path: PathBuf,
        message: String,
    },

    /// The transform could not be set up (bad targets, unreadable template root)
    #[error("{transform}: {message}")]
    Setup { transform: String, message: String },
}

impl TransformError {
    pub fn input(transform: &str, path: &Path, message: impl ToString) -> Self {
        TransformError::Input {
            transform: transform.to_string(),
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn setup(transform: &str, message: impl ToString) -> Self {
        TransformError::Setup {
            transform: transform.to_string(),
            message: message.to_string(),
        }
    }

    /// File that caused the error, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            TransformError::Input { path, .. } => Some(path),
            TransformError::Setup { .. } => None,
        }
    }
}

/// A file set transform
pub trait Transform: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Transform the whole set
    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError>;
}

/// One conditional step of a chain
#[derive(Clone)]
pub struct TransformStep {
    pub when: When,
    pub transform: Arc<dyn Transform>,
}

impl std::fmt::Debug for TransformStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformStep")
            .field("when", &self.when)
            .field("transform", &self.transform.name())
            .finish()
    }
}

/// Ordered sequence of conditional steps
#[derive(Debug, Clone, Default)]
pub struct TransformChain {
    steps: Vec<TransformStep>,
}

impl TransformChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step (builder form)
    pub fn then(mut self, when: When, transform: impl Transform + 'static) -> Self {
        self.steps.push(TransformStep {
            when,
            transform: Arc::new(transform),
        });
        self
    }

    /// Names of the steps that run in `mode`
    pub fn active(&self, mode: BuildMode) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.when.holds(mode))
            .map(|s| s.transform.name())
            .collect()
    }

    /// Run every step whose predicate holds for `mode`
    pub fn apply(&self, mut files: FileSet, mode: BuildMode) -> Result<FileSet, TransformError> {
        for step in &self.steps {
            if !step.when.holds(mode) {
                continue;
            }
            debug!("{} on {} file(s)", step.transform.name(), files.len());
            files = step.transform.apply(files)?;
        }
        Ok(files)
    }
}

/// Apply `f` to every file's text, replacing its contents
///
/// Shared by the text transforms; non-UTF-8 input is an input error.
pub(crate) fn map_text<F>(name: &str, files: FileSet, mut f: F) -> Result<FileSet, TransformError>
where
    F: FnMut(&Path, &str) -> Result<String, String>,
{
    files
        .into_iter()
        .map(|mut file| {
            let text = file
                .text()
                .map_err(|e| TransformError::input(name, &file.path, e))?;
            let out = f(&file.path, text).map_err(|e| TransformError::input(name, &file.path, e))?;
            file.contents = out.into_bytes();
            Ok(file)
        })
        .collect()
}
