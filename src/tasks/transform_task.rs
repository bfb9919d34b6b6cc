//! Tasks that read a glob, run a transform chain and write the result

use super::{Task, TaskContext, TaskError, TaskReport};
use crate::core::condition::When;
use crate::core::config::Config;
use crate::core::fileset::{FileQuery, FileSet};
use crate::server::Reload;
use crate::transform::{
    Autoprefix, CssMinify, HtmlMinify, JsMinify, PngOptimize, RenameSegments, SassCompile,
    SourceMapInit, SourceMapWrite, TemplateRender, TransformChain,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Image extensions handled by the images task and skipped by extras
pub const IMAGE_EXTENSIONS: &str = "{jpg,jpeg,png,gif,svg}";

/// What happens after a task wrote its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,

    /// Push the written files to the dev server for in-place swapping
    StreamReload,
}

fn glob_under(dir: &Path, pattern: &str) -> String {
    let dir = dir.to_string_lossy();
    let dir = dir.trim_end_matches('/');
    format!("{}/{}", dir, pattern)
}

fn asset_query(config: &Config, pattern: &str) -> Result<FileQuery, globset::Error> {
    Ok(
        FileQuery::new(&config.cwd, &[glob_under(config.assets_relative(), pattern)])?
            .walk_from(&config.assets)
            .prune(&config.temp)
            .prune(&config.output),
    )
}

/// `{assets}/**/*.scss`
pub fn style_sources(config: &Config) -> Result<FileQuery, globset::Error> {
    asset_query(config, "**/*.scss")
}

/// `{assets}/**/*.js`
pub fn script_sources(config: &Config) -> Result<FileQuery, globset::Error> {
    asset_query(config, "**/*.js")
}

/// `{assets}/**/*.{jpg,jpeg,png,gif,svg}`
pub fn image_sources(config: &Config) -> Result<FileQuery, globset::Error> {
    asset_query(config, &format!("**/*.{}", IMAGE_EXTENSIONS))
}

/// `{cwd}/*.html`, top level only
pub fn page_sources(config: &Config) -> Result<FileQuery, globset::Error> {
    Ok(FileQuery::new(&config.cwd, &["*.html"])?.max_depth(1))
}

/// `{cwd}/**/*.html` outside temp and output: pages plus everything they include
pub fn page_templates(config: &Config) -> Result<FileQuery, globset::Error> {
    Ok(FileQuery::new(&config.cwd, &["**/*.html"])?
        .prune(&config.temp)
        .prune(&config.output)
        .prune(config.cwd.join("node_modules")))
}

/// A glob, a chain and a destination
pub struct TransformTask {
    name: String,
    description: String,
    query: FileQuery,
    chain: TransformChain,
    dest: PathBuf,
    side_effect: SideEffect,
}

impl TransformTask {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        query: FileQuery,
        chain: TransformChain,
        dest: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            query,
            chain,
            dest: dest.into(),
            side_effect: SideEffect::None,
        }
    }

    pub fn with_side_effect(mut self, side_effect: SideEffect) -> Self {
        self.side_effect = side_effect;
        self
    }

    /// Compile SCSS into the temp directory
    pub fn styles(config: &Arc<Config>) -> Result<Self, TaskError> {
        let chain = TransformChain::new()
            .then(When::Debug, SourceMapInit)
            .then(When::Always, SassCompile)
            .then(When::Release, Autoprefix::last_two_versions()?)
            .then(When::Release, CssMinify)
            .then(When::Debug, SourceMapWrite)
            .then(When::Always, RenameSegments::stylesheets());

        Ok(Self::new(
            "styles",
            "Compile SCSS to CSS",
            style_sources(config)?,
            chain,
            &config.temp,
        )
        .with_side_effect(SideEffect::StreamReload))
    }

    /// Minify scripts into the temp directory
    pub fn scripts(config: &Arc<Config>) -> Result<Self, TaskError> {
        let chain = TransformChain::new()
            .then(When::Debug, SourceMapInit)
            .then(When::Release, JsMinify)
            .then(When::Debug, SourceMapWrite);

        Ok(Self::new(
            "scripts",
            "Minify JavaScript",
            script_sources(config)?,
            chain,
            &config.temp,
        )
        .with_side_effect(SideEffect::StreamReload))
    }

    /// Render top-level pages into the temp directory
    pub fn pages(config: &Arc<Config>) -> Result<Self, TaskError> {
        let chain = TransformChain::new()
            .then(When::Always, TemplateRender::new(Arc::clone(config)))
            .then(When::Release, HtmlMinify::new());

        Ok(Self::new(
            "pages",
            "Render HTML templates",
            page_sources(config)?,
            chain,
            &config.temp,
        ))
    }

    /// Optimize images straight into the output directory
    pub fn images(config: &Arc<Config>) -> Result<Self, TaskError> {
        let chain = TransformChain::new().then(When::Release, PngOptimize::new());

        Ok(Self::new(
            "images",
            "Optimize images",
            image_sources(config)?,
            chain,
            &config.output,
        ))
    }
}

#[async_trait]
impl Task for TransformTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, ctx: &TaskContext) -> Result<TaskReport, TaskError> {
        let files = FileSet::read(&self.query)
            .await
            .map_err(|e| TaskError::io("read", self.query.root(), e))?;

        let mode = ctx.config.mode();
        debug!(
            "{}: {} input file(s), {} build [{}]",
            self.name,
            files.len(),
            mode,
            self.chain.active(mode).join(" | ")
        );

        let out = self.chain.apply(files, mode)?;
        let written = out
            .write_to(&self.dest)
            .await
            .map_err(|e| TaskError::io("write", &self.dest, e))?;

        if self.side_effect == SideEffect::StreamReload && !out.is_empty() {
            let swapped: Vec<PathBuf> = out
                .paths()
                .into_iter()
                .filter(|p| p.extension().map_or(true, |ext| ext != "map"))
                .collect();
            ctx.notifier.notify(Reload::stream(&swapped));
        }

        Ok(TaskReport::written(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ConfigOverrides, SiteConfig};
    use crate::server::ReloadNotifier;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<Reload>>);

    impl ReloadNotifier for Recorder {
        fn notify(&self, reload: Reload) {
            self.0.lock().unwrap().push(reload);
        }
    }

    fn config(dir: &Path, production: bool) -> Arc<Config> {
        let overrides = ConfigOverrides {
            production,
            port: None,
        };
        Arc::new(SiteConfig::default().resolve(dir, &overrides))
    }

    fn write(dir: &Path, rel: &str, text: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, text).unwrap();
    }

    #[test]
    fn test_source_queries() {
        let config = Config::with_defaults(Path::new("/site"));

        let styles = style_sources(&config).unwrap();
        assert!(styles.matches(Path::new("/site/assets/scss/main.scss")));
        assert!(!styles.matches(Path::new("/site/main.scss")));

        let images = image_sources(&config).unwrap();
        assert!(images.matches(Path::new("/site/assets/img/a.jpeg")));
        assert!(images.matches(Path::new("/site/assets/logo.svg")));
        assert!(!images.matches(Path::new("/site/assets/img/a.webp")));

        let pages = page_sources(&config).unwrap();
        assert!(pages.matches(Path::new("/site/index.html")));
        assert!(!pages.matches(Path::new("/site/partials/nav.html")));

        let templates = page_templates(&config).unwrap();
        assert!(templates.matches(Path::new("/site/partials/nav.html")));
        assert!(!templates.matches(Path::new("/site/.tmp/index.html")));
        assert!(!templates.matches(Path::new("/site/dist/index.html")));
    }

    #[test]
    fn test_active_steps_per_mode() {
        let config = config(Path::new("/site"), false);
        let styles = TransformTask::styles(&config).unwrap();
        assert_eq!(
            styles.chain.active(crate::core::BuildMode::Debug),
            vec!["sourcemaps.init", "sass", "sourcemaps.write", "rename"]
        );
        assert_eq!(
            styles.chain.active(crate::core::BuildMode::Release),
            vec!["sass", "autoprefixer", "cssmin", "rename"]
        );
    }

    #[tokio::test]
    async fn test_styles_debug_writes_maps_and_notifies() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "assets/scss/main.scss", ".a { .b { color: red; } }\n");
        write(dir.path(), "assets/scss/_mixins.scss", "$x: 1;\n");

        let config = config(dir.path(), false);
        let recorder = Arc::new(Recorder::default());
        let ctx = TaskContext::new(Arc::clone(&config), recorder.clone());

        let report = TransformTask::styles(&config).unwrap().run(&ctx).await.unwrap();

        let css = dir.path().join(".tmp/assets/css/main.css");
        assert_eq!(
            report.files_written,
            vec![css.clone(), dir.path().join(".tmp/assets/css/main.css.map")]
        );
        let text = fs::read_to_string(css).unwrap();
        assert!(text.contains(".a .b {\n"));
        assert!(!dir.path().join(".tmp/assets/css/_mixins.css").exists());

        let reloads = recorder.0.lock().unwrap();
        assert_eq!(
            *reloads,
            vec![Reload::Stream {
                paths: vec!["/assets/css/main.css".to_string()]
            }]
        );
    }

    #[tokio::test]
    async fn test_styles_release_is_minified_without_maps() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "assets/scss/main.scss", ".a {\n  .b { color: red; }\n}\n");

        let config = config(dir.path(), true);
        let ctx = TaskContext::offline(Arc::clone(&config));
        let report = TransformTask::styles(&config).unwrap().run(&ctx).await.unwrap();

        assert_eq!(report.files_written.len(), 1);
        let text = fs::read_to_string(dir.path().join(".tmp/assets/css/main.css")).unwrap();
        assert_eq!(text, ".a .b{color:red}");
    }

    #[tokio::test]
    async fn test_failed_page_names_file() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "index.html", "{% for %}");

        let config = config(dir.path(), false);
        let ctx = TaskContext::offline(Arc::clone(&config));
        let err = TransformTask::pages(&config).unwrap().run(&ctx).await.unwrap_err();

        match err {
            TaskError::Transform(e) => assert_eq!(e.path(), Some(Path::new("index.html"))),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!dir.path().join(".tmp/index.html").exists());
    }

    #[tokio::test]
    async fn test_images_land_in_output() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "assets/img/logo.svg", "<svg/>");

        let config = config(dir.path(), false);
        let ctx = TaskContext::offline(Arc::clone(&config));
        TransformTask::images(&config).unwrap().run(&ctx).await.unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("dist/assets/img/logo.svg")).unwrap(),
            "<svg/>"
        );
    }
}
