//! Command-line interface

pub mod commands;
pub mod output;

use crate::core::config::ConfigOverrides;
use clap::{Parser, Subcommand};
use commands::{TasksCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Static site task runner
#[derive(Debug, Parser, Clone)]
#[command(name = "siteflow")]
#[command(version)]
#[command(about = "Compile, serve, build and deploy static web projects", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the site configuration file (default: ./siteflow.yml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Project directory (default: current directory)
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Release build: minify, prefix and optimize, no source maps
    #[arg(short, long, global = true)]
    pub production: bool,

    /// Dev server port
    #[arg(long, global = true)]
    pub port: Option<u16>,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Create a new project in an empty directory
    Init,

    /// Compile SCSS to CSS
    Styles,

    /// Minify JavaScript
    Scripts,

    /// Render HTML templates
    Pages,

    /// Run styles, scripts and pages concurrently
    Compile,

    /// Compile, then serve with live reload
    Serve,

    /// Optimize images
    Images,

    /// Copy compiled and static files into the output directory
    Extras,

    /// Delete the output and temp directories
    Clean,

    /// Clean, compile and assemble the output directory
    Build,

    /// Build, then serve the output directory
    #[command(name = "serve:dist")]
    ServeDist,

    /// Build, then publish the output directory
    Deploy,

    /// Check the configuration and print the resolved values
    Validate(ValidateCommand),

    /// List commands and the tasks they run
    Tasks(TasksCommand),
}

impl Command {
    /// Run plan behind the command, `None` for informational commands
    pub fn plan_name(&self) -> Option<&'static str> {
        let name = match self {
            Command::Init => "init",
            Command::Styles => "styles",
            Command::Scripts => "scripts",
            Command::Pages => "pages",
            Command::Compile => "compile",
            Command::Serve => "serve",
            Command::Images => "images",
            Command::Extras => "extras",
            Command::Clean => "clean",
            Command::Build => "build",
            Command::ServeDist => "serve:dist",
            Command::Deploy => "deploy",
            Command::Validate(_) | Command::Tasks(_) => return None,
        };
        Some(name)
    }
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// Command-line values that win over the config file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            production: self.production,
            port: self.port,
        }
    }

    /// Project directory as an absolute path
    pub fn working_dir(&self) -> std::io::Result<PathBuf> {
        let current = std::env::current_dir()?;
        Ok(match &self.cwd {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => current.join(dir),
            None => current,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_dist_with_globals() {
        let cli = Cli::try_parse_from([
            "siteflow",
            "serve:dist",
            "--production",
            "--port",
            "8080",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::ServeDist));
        assert_eq!(cli.command.plan_name(), Some("serve:dist"));
        assert!(cli.overrides().production);
        assert_eq!(cli.overrides().port, Some(8080));
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["siteflow", "build"]).unwrap();
        assert!(!cli.production);
        assert_eq!(cli.working_dir().unwrap(), std::env::current_dir().unwrap());
    }

    #[test]
    fn test_validate_is_not_a_run() {
        let cli = Cli::try_parse_from(["siteflow", "validate", "--json"]).unwrap();
        match &cli.command {
            Command::Validate(cmd) => assert!(cmd.json),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.command.plan_name(), None);
    }

    #[test]
    fn test_rejects_unknown_task_and_flag() {
        assert!(Cli::try_parse_from(["siteflow", "build", "--strategy", "sequential"]).is_err());
        assert!(Cli::try_parse_from(["siteflow", "publish"]).is_err());
    }
}
