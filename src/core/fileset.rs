//! File sets: glob matches read into memory at task invocation time

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Source captured by a source-map init step, consumed by the write step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapCapture {
    /// Source path as it appears in the map's `sources`
    pub source: String,

    /// Original content, embedded as `sourcesContent`
    pub content: String,
}

/// One file flowing through a transform chain
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the query base; this is where the file lands
    /// under the destination directory
    pub path: PathBuf,

    /// Absolute path the file was read from
    pub origin: PathBuf,

    pub contents: Vec<u8>,

    /// Set while source-map capture is active
    pub source_map: Option<SourceMapCapture>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, origin: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            origin: origin.into(),
            contents,
            source_map: None,
        }
    }

    /// Contents as UTF-8 text
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.contents)
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

/// Ordered collection of files
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<SourceFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every file matched by the query
    pub async fn read(query: &FileQuery) -> io::Result<Self> {
        let mut files = Vec::new();
        for (origin, path) in query.matches_on_disk()? {
            let contents = tokio::fs::read(&origin).await?;
            files.push(SourceFile::new(path, origin, contents));
        }
        debug!("Matched {} file(s) under {}", files.len(), query.root().display());
        Ok(Self { files })
    }

    pub fn push(&mut self, file: SourceFile) {
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SourceFile> {
        self.files.iter()
    }

    /// Relative paths of every file
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&SourceFile> {
        let path = path.as_ref();
        self.files.iter().find(|f| f.path == path)
    }

    /// Write every file below `dest`, creating directories as needed
    pub async fn write_to(&self, dest: &Path) -> io::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.files.len());
        for file in &self.files {
            let target = dest.join(&file.path);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &file.contents).await?;
            written.push(target);
        }
        Ok(written)
    }
}

impl IntoIterator for FileSet {
    type Item = SourceFile;
    type IntoIter = std::vec::IntoIter<SourceFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl FromIterator<SourceFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = SourceFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// Compile glob patterns with `*` confined to one path segment
pub fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(
            GlobBuilder::new(pattern.as_ref())
                .literal_separator(true)
                .build()?,
        );
    }
    builder.build()
}

/// A glob query against the filesystem
///
/// Patterns are relative to `base`. Walking starts at `root`, which must be
/// `base` or a directory below it. Hidden entries are skipped unless `dot`
/// is set, and `prune` directories are never entered.
#[derive(Debug, Clone)]
pub struct FileQuery {
    base: PathBuf,
    root: PathBuf,
    include: GlobSet,
    exclude: GlobSet,
    prune: Vec<PathBuf>,
    max_depth: Option<usize>,
    dot: bool,
    files_only: bool,
}

impl FileQuery {
    /// Match `patterns` under `base`, walking from `base`
    pub fn new<S: AsRef<str>>(base: impl Into<PathBuf>, patterns: &[S]) -> Result<Self, globset::Error> {
        let base = base.into();
        Ok(Self {
            root: base.clone(),
            base,
            include: build_globset(patterns)?,
            exclude: GlobSet::empty(),
            prune: Vec::new(),
            max_depth: None,
            dot: false,
            files_only: true,
        })
    }

    /// Start walking at `root` instead of `base`
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn walk_from(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Reject paths matching any of `patterns`
    pub fn exclude<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, globset::Error> {
        self.exclude = build_globset(patterns)?;
        Ok(self)
    }

    /// Never descend into `dir`
    pub fn prune(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prune.push(dir.into());
        self
    }

    /// Limit walking depth relative to the root
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Include hidden files and directories
    pub fn dot(mut self, dot: bool) -> Self {
        self.dot = dot;
        self
    }

    /// Check a single absolute path against the query without touching disk
    pub fn matches(&self, path: &Path) -> bool {
        if !path.starts_with(&self.root) {
            return false;
        }
        if self.prune.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        if let Some(max) = self.max_depth {
            let depth = path
                .strip_prefix(&self.root)
                .map(|rel| rel.components().count())
                .unwrap_or(usize::MAX);
            if depth > max {
                return false;
            }
        }
        match path.strip_prefix(&self.base) {
            Ok(rel) => self.matches_relative(rel),
            Err(_) => false,
        }
    }

    fn matches_relative(&self, rel: &Path) -> bool {
        if !self.dot && is_hidden(rel) {
            return false;
        }
        self.include.is_match(rel) && !self.exclude.is_match(rel)
    }

    /// Walk the filesystem, returning `(absolute, relative-to-base)` pairs
    /// sorted by relative path
    ///
    /// A missing root yields no matches. Any other walk error, such as an
    /// unreadable directory or a symlink loop, is returned.
    pub fn matches_on_disk(&self) -> io::Result<Vec<(PathBuf, PathBuf)>> {
        let mut walker = WalkDir::new(&self.root).follow_links(true);
        if let Some(max) = self.max_depth {
            walker = walker.max_depth(max);
        }

        let entries = walker.into_iter().filter_entry(|entry| {
            let path = entry.path();
            if entry.depth() == 0 {
                return true;
            }
            if self.prune.iter().any(|dir| path.starts_with(dir)) {
                return false;
            }
            self.dot || !entry.file_name().to_string_lossy().starts_with('.')
        });

        let mut found: Vec<(PathBuf, PathBuf)> = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 && is_not_found(&e) => return Ok(Vec::new()),
                Err(e) => return Err(io::Error::from(e)),
            };
            if self.files_only && !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&self.base) else {
                continue;
            };
            if self.matches_relative(rel) {
                let rel = rel.to_path_buf();
                found.push((entry.into_path(), rel));
            }
        }

        found.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(found)
    }
}

fn is_not_found(e: &walkdir::Error) -> bool {
    e.io_error()
        .is_some_and(|source| source.kind() == io::ErrorKind::NotFound)
}

/// Root-relative URL path of a project-relative file path
pub fn url_path(rel: &Path) -> String {
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    format!("/{}", parts.join("/"))
}

/// True when any component of a relative path starts with a dot
pub fn is_hidden(rel: &Path) -> bool {
    rel.components().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel.as_bytes()).unwrap();
    }

    #[test]
    fn test_star_does_not_cross_directories() {
        let set = build_globset(&["*.html"]).unwrap();
        assert!(set.is_match("index.html"));
        assert!(!set.is_match("partials/header.html"));

        let set = build_globset(&["**/*.html"]).unwrap();
        assert!(set.is_match("index.html"));
        assert!(set.is_match("partials/header.html"));
    }

    #[test]
    fn test_url_path() {
        assert_eq!(url_path(Path::new("assets/css/main.css")), "/assets/css/main.css");
        assert_eq!(url_path(Path::new("./index.html")), "/index.html");
    }

    #[test]
    fn test_matches_respects_root_and_hidden() {
        let query = FileQuery::new("/site", &["assets/**/*.scss"])
            .unwrap()
            .walk_from("/site/assets");

        assert!(query.matches(Path::new("/site/assets/scss/main.scss")));
        assert!(!query.matches(Path::new("/site/assets/js/main.js")));
        assert!(!query.matches(Path::new("/site/assets/.cache/x.scss")));
        assert!(!query.matches(Path::new("/elsewhere/assets/main.scss")));
    }

    #[test]
    fn test_matches_respects_prune_and_exclude() {
        let query = FileQuery::new("/site", &["**/*.html"])
            .unwrap()
            .exclude(&["drafts/**"])
            .unwrap()
            .prune("/site/dist");

        assert!(query.matches(Path::new("/site/about.html")));
        assert!(query.matches(Path::new("/site/partials/nav.html")));
        assert!(!query.matches(Path::new("/site/dist/index.html")));
        assert!(!query.matches(Path::new("/site/drafts/wip.html")));
    }

    #[tokio::test]
    async fn test_read_collects_sorted_relative_paths() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "assets/scss/b.scss");
        touch(dir.path(), "assets/scss/a.scss");
        touch(dir.path(), "assets/js/app.js");
        touch(dir.path(), "assets/.hidden/c.scss");

        let query = FileQuery::new(dir.path(), &["assets/**/*.scss"])
            .unwrap()
            .walk_from(dir.path().join("assets"));
        let files = FileSet::read(&query).await.unwrap();

        assert_eq!(
            files.paths(),
            vec![
                PathBuf::from("assets/scss/a.scss"),
                PathBuf::from("assets/scss/b.scss")
            ]
        );
        let first = files.iter().next().unwrap();
        assert_eq!(first.text().unwrap(), "assets/scss/a.scss");
        assert_eq!(first.origin, dir.path().join("assets/scss/a.scss"));
    }

    #[tokio::test]
    async fn test_max_depth_limits_to_root_level() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "index.html");
        touch(dir.path(), "partials/nav.html");

        let query = FileQuery::new(dir.path(), &["*.html"]).unwrap().max_depth(1);
        let files = FileSet::read(&query).await.unwrap();
        assert_eq!(files.paths(), vec![PathBuf::from("index.html")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_loop_is_an_error() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "assets/js/main.js");
        std::os::unix::fs::symlink("..", dir.path().join("assets/js/loop")).unwrap();

        let query = FileQuery::new(dir.path(), &["assets/**/*.js"])
            .unwrap()
            .walk_from(dir.path().join("assets"));

        assert!(query.matches_on_disk().is_err());
        assert!(FileSet::read(&query).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_root_yields_empty_set() {
        let dir = TempDir::new().unwrap();
        let query = FileQuery::new(dir.path(), &["assets/**/*.js"])
            .unwrap()
            .walk_from(dir.path().join("assets"));
        let files = FileSet::read(&query).await.unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_write_to_creates_directories() {
        let dir = TempDir::new().unwrap();
        let mut files = FileSet::new();
        files.push(SourceFile::new("assets/css/main.css", "/src/main.scss", b"body{}".to_vec()));

        let written = files.write_to(&dir.path().join("out")).await.unwrap();
        assert_eq!(written, vec![dir.path().join("out/assets/css/main.css")]);
        assert_eq!(
            fs::read_to_string(dir.path().join("out/assets/css/main.css")).unwrap(),
            "body{}"
        );
    }
}
