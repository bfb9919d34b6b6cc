//! Shared fixtures for siteflow integration tests

#![allow(dead_code)]

use siteflow::core::config::{Config, ConfigOverrides, SiteConfig};
use siteflow::execution::{ExecutionEngine, PipelineError, TaskExecutor};
use siteflow::server::{NoopNotifier, Reload, ReloadNotifier};
use siteflow::tasks::catalog;
use siteflow::tasks::{TaskContext, TaskRegistry};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A throwaway project directory
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// A small site with one of everything
    pub fn site() -> Self {
        let project = Self::empty();
        project.write(
            "siteflow.yml",
            "exclude:\n  - siteflow.yml\n  - notes/**\ntitle: Fixture\n",
        );
        project.write(
            "index.html",
            "<!doctype html>\n<html>\n<head><title>{{ title }}</title></head>\n<body>\n  {% include \"partials/nav.html\" %}\n  <!-- drop me -->\n  <p>Hello</p>\n</body>\n</html>\n",
        );
        project.write("about.html", "<html><body><h1>About {{ title }}</h1></body></html>\n");
        project.write("partials/nav.html", "<nav>{{ title }}</nav>\n");
        project.write("assets/scss/_vars.scss", "$brand: #336699;\n");
        project.write(
            "assets/scss/main.scss",
            "@import 'vars';\n.header {\n  color: $brand;\n  .title { user-select: none; }\n}\n",
        );
        project.write("assets/js/main.js", "function greet(name) {\n  return 'hi ' + name;\n}\ngreet('you');\n");
        project.write("assets/img/logo.svg", "<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        project.write("assets/fonts/site.woff", "woff");
        project.write("robots.txt", "User-agent: *\n");
        project.write("notes/todo.txt", "private");
        project
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, text: &str) {
        let path = self.join(rel);
        fs::create_dir_all(path.parent().expect("parent dir")).expect("create dirs");
        fs::write(path, text).expect("write file");
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.join(rel)).unwrap_or_else(|e| panic!("read {}: {}", rel, e))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.join(rel).exists()
    }

    /// Resolved config, read from `siteflow.yml` when present
    pub fn config(&self, production: bool) -> Arc<Config> {
        let overrides = ConfigOverrides {
            production,
            port: None,
        };
        let site = SiteConfig::discover(self.path(), None).expect("valid config");
        Arc::new(site.resolve(self.path(), &overrides))
    }

    /// Every file under `rel` with its contents, keyed by relative path
    pub fn snapshot(&self, rel: &str) -> BTreeMap<PathBuf, Vec<u8>> {
        let root = self.join(rel);
        WalkDir::new(&root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let rel = entry.path().strip_prefix(&root).expect("under root").to_path_buf();
                let bytes = fs::read(entry.path()).expect("read file");
                (rel, bytes)
            })
            .collect()
    }
}

/// Collects every reload sent by tasks
#[derive(Default)]
pub struct RecordingNotifier {
    reloads: Mutex<Vec<Reload>>,
}

impl RecordingNotifier {
    pub fn take(&self) -> Vec<Reload> {
        std::mem::take(&mut *self.reloads.lock().unwrap())
    }
}

impl ReloadNotifier for RecordingNotifier {
    fn notify(&self, reload: Reload) {
        self.reloads.lock().unwrap().push(reload);
    }
}

pub fn executor(config: &Arc<Config>, notifier: Arc<dyn ReloadNotifier>) -> Arc<TaskExecutor> {
    let registry = TaskRegistry::standard(config).expect("standard tasks");
    Arc::new(TaskExecutor::new(
        registry,
        TaskContext::new(Arc::clone(config), notifier),
    ))
}

/// Run a catalog command to completion without a dev server
pub async fn run_command(config: &Arc<Config>, command: &str) -> Result<(), PipelineError> {
    let mut graph = catalog::plan(command).expect("known command");
    let engine = ExecutionEngine::new(executor(config, Arc::new(NoopNotifier)));
    engine.execute(&mut graph).await
}
