//! Task graph: the declarative plan of a pipeline run
//!
//! Nodes are task names, edges are "must complete before". The graph also
//! carries the per-task state of the run that executes it.

use crate::core::state::{RunState, TaskState};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Problems found while validating a graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task '{0}' is declared twice")]
    DuplicateTask(String),

    #[error("Task '{task}' depends on undeclared task '{dependency}'")]
    UnknownDependency { task: String, dependency: String },

    #[error("Cycle detected in task graph involving '{0}'")]
    Cycle(String),
}

/// A task in the graph
#[derive(Debug, Clone)]
pub struct TaskNode {
    /// Task name, resolved against the registry at run time
    pub name: String,

    /// Tasks that must complete before this one starts
    pub dependencies: Vec<String>,

    /// Runtime state
    pub state: TaskState,
}

impl TaskNode {
    /// Check if every dependency is in the completed set
    pub fn dependencies_met(&self, completed: &HashSet<&str>) -> bool {
        self.dependencies.iter().all(|dep| completed.contains(dep.as_str()))
    }
}

/// A named run plan
#[derive(Debug, Clone)]
pub struct TaskGraph {
    /// Plan name (the CLI command that produced it)
    pub name: String,

    /// Nodes by task name
    nodes: HashMap<String, TaskNode>,

    /// Declaration order, used to break ties deterministically
    declared: Vec<String>,

    /// First duplicate declaration, reported by `validate`
    duplicate: Option<String>,

    /// Run state
    pub state: RunState,
}

impl TaskGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: HashMap::new(),
            declared: Vec::new(),
            duplicate: None,
            state: RunState::new(),
        }
    }

    /// Declare a task and its dependencies (builder form)
    pub fn task(mut self, name: &str, dependencies: &[&str]) -> Self {
        self.add_task(name, dependencies.iter().map(|d| d.to_string()).collect());
        self
    }

    /// Declare a task and its dependencies
    pub fn add_task(&mut self, name: impl Into<String>, dependencies: Vec<String>) {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            self.duplicate.get_or_insert(name);
            return;
        }
        self.declared.push(name.clone());
        self.nodes.insert(
            name.clone(),
            TaskNode {
                name,
                dependencies,
                state: TaskState::Pending,
            },
        );
    }

    /// Check for duplicates, dangling edges and cycles
    pub fn validate(&self) -> Result<(), GraphError> {
        if let Some(name) = &self.duplicate {
            return Err(GraphError::DuplicateTask(name.clone()));
        }

        for name in &self.declared {
            let node = &self.nodes[name];
            for dep in &node.dependencies {
                if !self.nodes.contains_key(dep) {
                    return Err(GraphError::UnknownDependency {
                        task: name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let mut visited = HashSet::new();
        let mut stack = HashSet::new();
        for name in &self.declared {
            if !visited.contains(name.as_str()) {
                self.dfs_check(name, &mut visited, &mut stack)?;
            }
        }

        Ok(())
    }

    fn dfs_check<'a>(
        &'a self,
        name: &'a str,
        visited: &mut HashSet<&'a str>,
        stack: &mut HashSet<&'a str>,
    ) -> Result<(), GraphError> {
        visited.insert(name);
        stack.insert(name);

        if let Some(node) = self.nodes.get(name) {
            for dep in &node.dependencies {
                if stack.contains(dep.as_str()) {
                    return Err(GraphError::Cycle(dep.clone()));
                }
                if !visited.contains(dep.as_str()) {
                    self.dfs_check(dep, visited, stack)?;
                }
            }
        }

        stack.remove(name);
        Ok(())
    }

    /// Number of tasks
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Task names in declaration order
    pub fn names(&self) -> &[String] {
        &self.declared
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut TaskNode> {
        self.nodes.get_mut(name)
    }

    /// Iterate nodes in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.declared.iter().map(move |name| &self.nodes[name])
    }

    /// Pending tasks whose dependencies have all completed, in declaration order
    pub fn ready_tasks(&self) -> Vec<&TaskNode> {
        let completed: HashSet<&str> = self
            .nodes
            .values()
            .filter(|n| n.state.is_completed())
            .map(|n| n.name.as_str())
            .collect();

        self.nodes()
            .filter(|n| matches!(n.state, TaskState::Pending) && n.dependencies_met(&completed))
            .collect()
    }

    /// Tasks currently running
    pub fn running_tasks(&self) -> Vec<&TaskNode> {
        self.nodes().filter(|n| n.state.is_running()).collect()
    }

    /// Topological order, ties broken by declaration order
    pub fn execution_order(&self) -> Vec<String> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();

        for name in &self.declared {
            self.visit(name, &mut visited, &mut result);
        }

        result
    }

    fn visit(&self, name: &str, visited: &mut HashSet<String>, result: &mut Vec<String>) {
        if !visited.insert(name.to_string()) {
            return;
        }

        if let Some(node) = self.nodes.get(name) {
            for dep in &node.dependencies {
                self.visit(dep, visited, result);
            }
        }

        result.push(name.to_string());
    }

    /// Recount task states into the run state
    pub fn refresh_counts(&mut self) {
        let mut completed = 0;
        let mut failed = 0;
        let mut running = 0;

        for node in self.nodes.values() {
            match node.state {
                TaskState::Completed { .. } => completed += 1,
                TaskState::Failed { .. } => failed += 1,
                TaskState::Running { .. } => running += 1,
                _ => {}
            }
        }

        self.state.update_counts(completed, failed, running);
    }
}
