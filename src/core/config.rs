//! Site configuration from YAML

use crate::core::condition::BuildMode;
use anyhow::{Context, Result};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

/// Name of the config file looked up in the working directory
pub const CONFIG_FILE: &str = "siteflow.yml";

/// Port used by the dev server when none is configured
pub const DEFAULT_PORT: u16 = 3000;

fn default_assets() -> PathBuf {
    PathBuf::from("assets")
}

fn default_temp() -> PathBuf {
    PathBuf::from(".tmp")
}

fn default_output() -> PathBuf {
    PathBuf::from("dist")
}

fn default_branch() -> String {
    "gh-pages".to_string()
}

/// Commit identity used for deploy commits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployUser {
    pub name: String,
    pub email: String,
}

/// Deployment target as written in the config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Remote repository URL to push the output tree to
    #[serde(default)]
    pub remote: Option<String>,

    /// Branch that receives the output tree
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Local clone reused between deploys
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,

    /// Commit message for deploy commits
    #[serde(default)]
    pub message: Option<String>,

    /// Commit identity; git's own configuration applies when unset
    #[serde(default)]
    pub user: Option<DeployUser>,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            remote: None,
            branch: default_branch(),
            cache_dir: None,
            message: None,
            user: None,
        }
    }
}

/// Top-level site configuration loaded from `siteflow.yml`
///
/// Every field is optional in the file. Keys that are not recognized are
/// kept in `data` and exposed to page templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Asset root, relative to the working directory
    #[serde(default = "default_assets")]
    pub assets: PathBuf,

    /// Directory for compiled intermediates
    #[serde(default = "default_temp")]
    pub temp: PathBuf,

    /// Directory for the final site
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Debug builds keep source maps and skip minification
    #[serde(default)]
    pub debug: Option<bool>,

    /// Dev server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Deployment target
    #[serde(default)]
    pub deploy: DeployConfig,

    /// Extra globs the output assembler must not copy
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Free-form template data
    #[serde(flatten)]
    pub data: BTreeMap<String, serde_yaml::Value>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            assets: default_assets(),
            temp: default_temp(),
            output: default_output(),
            debug: None,
            port: None,
            deploy: DeployConfig::default(),
            exclude: Vec::new(),
            data: BTreeMap::new(),
        }
    }
}

/// Values given on the command line that win over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Force a release build regardless of `debug` in the file
    pub production: bool,

    /// Dev server port
    pub port: Option<u16>,
}

impl SiteConfig {
    /// Load site configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Parse site configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty file is a valid config
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: SiteConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Find the config for a working directory
    ///
    /// An explicit path must exist. Otherwise `siteflow.yml` in `cwd` is
    /// used when present, and defaults apply when it is not.
    pub fn discover(cwd: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let candidate = cwd.join(CONFIG_FILE);
        if candidate.is_file() {
            Self::from_file(candidate)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate the site configuration
    pub fn validate(&self) -> Result<()> {
        for (key, dir) in [("assets", &self.assets), ("temp", &self.temp), ("output", &self.output)] {
            if !is_project_relative(dir) {
                anyhow::bail!(
                    "'{}' must be a relative path inside the project, got '{}'",
                    key,
                    dir.display()
                );
            }
        }

        if self.temp == self.output {
            anyhow::bail!("'temp' and 'output' must be different directories");
        }

        for dir in [&self.temp, &self.output] {
            if self.assets.starts_with(dir) {
                anyhow::bail!(
                    "Asset root '{}' cannot live inside '{}'",
                    self.assets.display(),
                    dir.display()
                );
            }
        }

        for pattern in &self.exclude {
            Glob::new(pattern)
                .with_context(|| format!("Invalid exclude pattern '{}'", pattern))?;
        }

        if self.port == Some(0) {
            anyhow::bail!("'port' must be greater than zero");
        }

        Ok(())
    }

    /// Resolve paths against the working directory and apply overrides
    pub fn resolve(self, cwd: &Path, overrides: &ConfigOverrides) -> Config {
        let debug = if overrides.production {
            false
        } else {
            self.debug.unwrap_or(true)
        };

        let deploy_cache = match self.deploy.cache_dir {
            Some(dir) if dir.is_absolute() => dir,
            Some(dir) => cwd.join(dir),
            None => default_deploy_cache(cwd),
        };

        Config {
            cwd: cwd.to_path_buf(),
            assets: cwd.join(&self.assets),
            temp: cwd.join(&self.temp),
            output: cwd.join(&self.output),
            debug,
            port: overrides.port.or(self.port).unwrap_or(DEFAULT_PORT),
            remote: self.deploy.remote,
            branch: self.deploy.branch,
            deploy_cache,
            deploy_message: self.deploy.message,
            deploy_user: self.deploy.user,
            exclude: self.exclude,
            data: self.data,
        }
    }
}

/// Relative, non-empty and never climbing out of the project
fn is_project_relative(path: &Path) -> bool {
    let mut normal = 0;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            _ => return false,
        }
    }
    normal > 0
}

/// `<user cache>/siteflow/deploy/<project dir name>`
fn default_deploy_cache(cwd: &Path) -> PathBuf {
    let project = cwd
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "site".to_string());

    match dirs::cache_dir() {
        Some(cache) => cache.join("siteflow").join("deploy").join(project),
        None => cwd.join(".deploy"),
    }
}

/// Resolved, immutable configuration shared by every task
///
/// Serialized as-is into the page template context.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Working directory (project root)
    pub cwd: PathBuf,

    /// Absolute asset root
    pub assets: PathBuf,

    /// Absolute temp directory
    pub temp: PathBuf,

    /// Absolute output directory
    pub output: PathBuf,

    /// Debug or release build
    pub debug: bool,

    /// Dev server port
    pub port: u16,

    /// Deployment remote
    pub remote: Option<String>,

    /// Deployment branch
    pub branch: String,

    /// Local clone used for deploys
    pub deploy_cache: PathBuf,

    /// Deploy commit message override
    pub deploy_message: Option<String>,

    /// Deploy commit identity
    pub deploy_user: Option<DeployUser>,

    /// User-declared exclusions for the output assembler
    pub exclude: Vec<String>,

    /// Template data from unrecognized config keys
    #[serde(flatten)]
    pub data: BTreeMap<String, serde_yaml::Value>,
}

impl Config {
    /// Defaults resolved against `cwd`
    pub fn with_defaults(cwd: &Path) -> Self {
        SiteConfig::default().resolve(cwd, &ConfigOverrides::default())
    }

    /// Build mode selected by the debug flag
    pub fn mode(&self) -> BuildMode {
        if self.debug {
            BuildMode::Debug
        } else {
            BuildMode::Release
        }
    }

    /// Output directory relative to the working directory
    pub fn output_relative(&self) -> &Path {
        self.output.strip_prefix(&self.cwd).unwrap_or(&self.output)
    }

    /// Asset root relative to the working directory
    pub fn assets_relative(&self) -> &Path {
        self.assets.strip_prefix(&self.cwd).unwrap_or(&self.assets)
    }
}
