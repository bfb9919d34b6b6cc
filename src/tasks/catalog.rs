//! Run plans for every command
//!
//! ```text
//! compile = styles | scripts | pages
//! build   = clean -> (images | styles | scripts | pages) -> extras
//! deploy  = build -> deploy
//! ```

use crate::core::graph::TaskGraph;

/// Commands and their one-line summaries, in display order
pub const COMMANDS: &[(&str, &str)] = &[
    ("init", "Create a new project in an empty directory"),
    ("styles", "Compile SCSS to CSS"),
    ("scripts", "Minify JavaScript"),
    ("pages", "Render HTML templates"),
    ("compile", "Run styles, scripts and pages concurrently"),
    ("serve", "Compile, then serve with live reload"),
    ("images", "Optimize images"),
    ("extras", "Copy compiled and static files into the output directory"),
    ("clean", "Delete the output and temp directories"),
    ("build", "Clean, compile and assemble the output directory"),
    ("serve:dist", "Build, then serve the output directory"),
    ("deploy", "Build, then publish the output directory"),
];

const SINGLE_TASKS: &[&str] = &["init", "styles", "scripts", "pages", "images", "extras", "clean"];

fn compile(name: &str) -> TaskGraph {
    TaskGraph::new(name)
        .task("styles", &[])
        .task("scripts", &[])
        .task("pages", &[])
}

fn build(name: &str) -> TaskGraph {
    TaskGraph::new(name)
        .task("clean", &[])
        .task("images", &["clean"])
        .task("styles", &["clean"])
        .task("scripts", &["clean"])
        .task("pages", &["clean"])
        .task("extras", &["images", "styles", "scripts", "pages"])
}

/// Task graph behind a command, `None` for unknown commands
pub fn plan(command: &str) -> Option<TaskGraph> {
    match command {
        "compile" | "serve" => Some(compile(command)),
        "build" | "serve:dist" => Some(build(command)),
        "deploy" => Some(build(command).task("deploy", &["extras"])),
        single if SINGLE_TASKS.contains(&single) => Some(TaskGraph::new(single).task(single, &[])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::tasks::TaskRegistry;
    use std::path::Path;
    use std::sync::Arc;

    #[test]
    fn test_every_command_has_a_valid_plan() {
        let config = Arc::new(Config::with_defaults(Path::new("/site")));
        let registry = TaskRegistry::standard(&config).unwrap();

        for (command, _) in COMMANDS {
            let graph = plan(command).unwrap_or_else(|| panic!("no plan for {}", command));
            graph.validate().unwrap();
            for name in graph.names() {
                assert!(registry.contains(name), "{} needs unknown task {}", command, name);
            }
        }
    }

    #[test]
    fn test_deploy_runs_after_build() {
        let graph = plan("deploy").unwrap();
        let order = graph.execution_order();
        assert_eq!(order.first().map(String::as_str), Some("clean"));
        assert_eq!(order.last().map(String::as_str), Some("deploy"));
        assert_eq!(graph.len(), 7);
    }

    #[test]
    fn test_compile_has_no_edges() {
        let graph = plan("compile").unwrap();
        assert_eq!(graph.ready_tasks().len(), 3);
    }

    #[test]
    fn test_unknown_command() {
        assert!(plan("lint").is_none());
    }
}
