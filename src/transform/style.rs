//! Stylesheet transforms: Sass compilation, vendor prefixing, minification
//! and output path rewriting

use super::{map_text, Transform, TransformError};
use crate::core::fileset::{FileSet, SourceFile};
use lightningcss::{
    printer::PrinterOptions,
    stylesheet::{MinifyOptions, ParserOptions, StyleSheet},
    targets::{Browsers, Targets},
};
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Browser query used for release builds
pub const DEFAULT_BROWSERS: &str = "last 2 versions";

/// Compile `.scss` files to expanded CSS
///
/// Imports resolve relative to the file's origin directory. Partials
/// (`_name.scss`) are dropped from the set; they only reach the output
/// through imports.
#[derive(Debug, Clone, Default)]
pub struct SassCompile;

fn is_partial(file: &SourceFile) -> bool {
    file.file_name().is_some_and(|name| name.starts_with('_'))
}

impl Transform for SassCompile {
    fn name(&self) -> &str {
        "sass"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        files
            .into_iter()
            .filter(|file| !is_partial(file))
            .map(|mut file| {
                let source = file
                    .text()
                    .map_err(|e| TransformError::input(self.name(), &file.path, e))?
                    .to_string();

                let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
                if let Some(dir) = file.origin.parent() {
                    options = options.load_path(dir);
                }

                let css = grass::from_string(source, &options)
                    .map_err(|e| TransformError::input(self.name(), &file.path, e))?;

                file.path.set_extension("css");
                file.contents = css.into_bytes();
                Ok(file)
            })
            .collect()
    }
}

/// Parse, optionally minify and print a stylesheet with the given targets
fn process_css(path: &Path, source: &str, targets: Targets, minify: bool) -> Result<String, String> {
    let mut sheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: path.to_string_lossy().into_owned(),
            ..Default::default()
        },
    )
    .map_err(|e| e.to_string())?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..Default::default()
        })
        .map_err(|e| e.to_string())?;

    let out = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..Default::default()
        })
        .map_err(|e| e.to_string())?;

    Ok(out.code)
}

fn is_css(path: &Path) -> bool {
    path.extension() == Some(OsStr::new("css"))
}

/// Add vendor prefixes for a browserslist query
#[derive(Debug, Clone)]
pub struct Autoprefix {
    targets: Targets,
}

impl Autoprefix {
    pub fn new<S: AsRef<str>>(queries: &[S]) -> Result<Self, TransformError> {
        let browsers = Browsers::from_browserslist(queries.iter().map(|q| q.as_ref()))
            .map_err(|e| TransformError::setup("autoprefixer", e))?;
        Ok(Self {
            targets: Targets {
                browsers,
                ..Targets::default()
            },
        })
    }

    /// Prefix for [`DEFAULT_BROWSERS`]
    pub fn last_two_versions() -> Result<Self, TransformError> {
        Self::new(&[DEFAULT_BROWSERS])
    }
}

impl Transform for Autoprefix {
    fn name(&self) -> &str {
        "autoprefixer"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), files, |path, text| {
            if !is_css(path) {
                return Ok(text.to_string());
            }
            process_css(path, text, self.targets, false)
        })
    }
}

/// Minify CSS
#[derive(Debug, Clone, Default)]
pub struct CssMinify;

impl Transform for CssMinify {
    fn name(&self) -> &str {
        "cssmin"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        map_text(self.name(), files, |path, text| {
            if !is_css(path) {
                return Ok(text.to_string());
            }
            process_css(path, text, Targets::default(), true)
        })
    }
}

/// Rename whole directory segments of every output path
///
/// Only directory components are rewritten; file names are kept.
#[derive(Debug, Clone)]
pub struct RenameSegments {
    from: Vec<String>,
    to: String,
}

impl RenameSegments {
    pub fn new<S: AsRef<str>>(from: &[S], to: &str) -> Self {
        Self {
            from: from.iter().map(|s| s.as_ref().to_string()).collect(),
            to: to.to_string(),
        }
    }

    /// `scss` and `sass` directories become `css`
    pub fn stylesheets() -> Self {
        Self::new(&["scss", "sass"], "css")
    }

    fn rename(&self, path: &Path) -> PathBuf {
        let file_name = path.file_name();
        let mut out = PathBuf::new();
        if let Some(parent) = path.parent() {
            for component in parent.components() {
                match component {
                    Component::Normal(name)
                        if self.from.iter().any(|f| OsStr::new(f) == name) =>
                    {
                        out.push(&self.to)
                    }
                    other => out.push(other.as_os_str()),
                }
            }
        }
        if let Some(name) = file_name {
            out.push(name);
        }
        out
    }
}

impl Transform for RenameSegments {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply(&self, files: FileSet) -> Result<FileSet, TransformError> {
        Ok(files
            .into_iter()
            .map(|mut file| {
                file.path = self.rename(&file.path);
                file
            })
            .collect())
    }
}
