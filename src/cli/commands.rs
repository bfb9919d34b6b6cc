//! CLI command definitions and their execution

use super::output::{self, style, RunReporter, CHECK, CROSS, INFO, ROCKET, WARN};
use super::{Cli, Command};
use crate::core::config::{Config, SiteConfig};
use crate::execution::{ExecutionEngine, PipelineError, TaskExecutor};
use crate::server::{DevServer, LiveReload, NoopNotifier, ReloadNotifier, ServeMode};
use crate::tasks::catalog::{self, COMMANDS};
use crate::tasks::{TaskContext, TaskRegistry};
use crate::watch::{ChangeWatcher, WatchDispatcher, WatchRules};
use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::{error, info};

/// Check the configuration and print the resolved values
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List commands and the tasks they run
#[derive(Debug, Args, Clone)]
pub struct TasksCommand {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Load and resolve the configuration for a CLI invocation
pub fn load_config(cli: &Cli) -> Result<Arc<Config>> {
    let cwd = cli
        .working_dir()
        .context("Failed to determine the working directory")?;
    let site = SiteConfig::discover(&cwd, cli.config.as_deref())?;
    Ok(Arc::new(site.resolve(&cwd, &cli.overrides())))
}

/// Dispatch a parsed command line
pub async fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Command::Validate(cmd) => return validate(cli, cmd),
        Command::Tasks(cmd) => return list_tasks(cmd),
        _ => {}
    }

    let config = load_config(cli)?;
    match &cli.command {
        Command::Serve => serve(cli, config, ServeMode::Dev).await,
        Command::ServeDist => serve(cli, config, ServeMode::Static).await,
        command => {
            let name = command
                .plan_name()
                .context("Command has no run plan")?;
            let executor = executor(&config, Arc::new(NoopNotifier))?;
            run_plan(cli, &executor, name).await?;
            Ok(())
        }
    }
}

fn executor(config: &Arc<Config>, notifier: Arc<dyn ReloadNotifier>) -> Result<Arc<TaskExecutor>> {
    let registry = TaskRegistry::standard(config).context("Failed to set up tasks")?;
    let ctx = TaskContext::new(Arc::clone(config), notifier);
    Ok(Arc::new(TaskExecutor::new(registry, ctx)))
}

async fn run_plan(cli: &Cli, executor: &Arc<TaskExecutor>, name: &str) -> Result<(), PipelineError> {
    let mut graph = catalog::plan(name).ok_or_else(|| PipelineError::UnknownTask(name.to_string()))?;

    let reporter = Arc::new(RunReporter::new(!cli.verbose));
    let handler = Arc::clone(&reporter);
    let engine = ExecutionEngine::new(Arc::clone(executor))
        .with_event_handler(move |event| handler.handle(event));

    println!(
        "{} {} ({} build)",
        ROCKET,
        style(name).bold(),
        executor.context().config.mode()
    );
    engine.execute(&mut graph).await
}

async fn serve(cli: &Cli, config: Arc<Config>, mode: ServeMode) -> Result<()> {
    let live = LiveReload::new();
    let notifier: Arc<dyn ReloadNotifier> = Arc::new(live.clone());
    let executor = executor(&config, Arc::clone(&notifier))?;

    let (plan, rules, watch_root) = match mode {
        ServeMode::Dev => ("serve", WatchRules::dev(&config)?, &config.cwd),
        ServeMode::Static => ("serve:dist", WatchRules::static_output(&config)?, &config.output),
    };

    if let Err(e) = run_plan(cli, &executor, plan).await {
        // Broken sources are fixed while the dev server runs
        if mode == ServeMode::Static {
            return Err(e.into());
        }
        error!("{}", e);
        println!("{} Initial compile failed, serving anyway", WARN);
    }

    let watcher = ChangeWatcher::new(watch_root)?;
    let dispatcher = WatchDispatcher::new(rules, executor, notifier);
    tokio::spawn(dispatcher.run(watcher));
    info!("Watching {}", watch_root.display());

    DevServer::new(mode, config, live).start().await?;
    Ok(())
}

fn validate(cli: &Cli, cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating configuration...", INFO);

    let config = match load_config(cli) {
        Ok(config) => config,
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(format!("{:#}", e)).red());
            std::process::exit(1);
        }
    };

    println!("{} Configuration is valid!", CHECK);
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&*config)?);
    } else {
        print!("{}", serde_yaml::to_string(&*config)?);
    }
    Ok(())
}

fn list_tasks(cmd: &TasksCommand) -> Result<()> {
    let plans = COMMANDS
        .iter()
        .filter_map(|(name, description)| Some((*name, *description, catalog::plan(name)?)));

    if cmd.json {
        let data: Vec<_> = plans
            .map(|(name, description, graph)| {
                let tasks: Vec<_> = graph
                    .nodes()
                    .map(|node| {
                        serde_json::json!({
                            "name": node.name,
                            "dependencies": node.dependencies,
                        })
                    })
                    .collect();
                serde_json::json!({
                    "name": name,
                    "description": description,
                    "tasks": tasks,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "commands": data }))?);
        return Ok(());
    }

    let width = COMMANDS.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, description, graph) in plans {
        println!(
            "  {:width$}  {}",
            style(name).bold(),
            description,
            width = width
        );
        if graph.len() > 1 {
            println!("  {:width$}  {}", "", style(output::format_plan(&graph)).dim(), width = width);
        }
    }
    Ok(())
}
