//! CLI output formatting

use crate::core::graph::TaskGraph;
use crate::core::ExecutionStatus;
use crate::execution::ExecutionEvent;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a run status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            run_id,
            name,
            total_tasks,
        } => format!(
            "{} Running {} ({} task(s), {})",
            INFO,
            style(name).bold(),
            total_tasks,
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::TaskStarted { task } => format!("{} {}", SPINNER, style(task).cyan()),
        ExecutionEvent::TaskCompleted {
            task,
            files_written,
            note,
            elapsed_ms,
        } => {
            let detail = match note {
                Some(note) => note.clone(),
                None => format!("{} file(s)", files_written),
            };
            format!(
                "{} {} {} {}",
                CHECK,
                style(task).green(),
                detail,
                style(format!("{}ms", elapsed_ms)).dim()
            )
        }
        ExecutionEvent::TaskFailed { task, error } => {
            format!("{} {}: {}", CROSS, style(task).red(), error)
        }
        ExecutionEvent::TaskSkipped { task } => {
            format!("{} {} skipped", WARN, style(task).yellow())
        }
        ExecutionEvent::RunCompleted { status, .. } => {
            let icon = match status {
                ExecutionStatus::Completed => CHECK,
                ExecutionStatus::Failed => CROSS,
                _ => INFO,
            };
            format!("{} Run {}", icon, format_status(*status))
        }
    }
}

/// Render a plan as stages: `clean -> images, styles -> extras`
pub fn format_plan(graph: &TaskGraph) -> String {
    let order = graph.execution_order();
    let mut stage: HashMap<&str, usize> = HashMap::new();
    for name in &order {
        let level = graph
            .node(name)
            .map(|node| {
                node.dependencies
                    .iter()
                    .filter_map(|dep| stage.get(dep.as_str()))
                    .map(|level| level + 1)
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0);
        stage.insert(name.as_str(), level);
    }

    let depth = stage.values().copied().max().map_or(0, |max| max + 1);
    let mut stages: Vec<Vec<&str>> = vec![Vec::new(); depth];
    for name in graph.names() {
        if let Some(level) = stage.get(name.as_str()) {
            stages[*level].push(name.as_str());
        }
    }

    stages
        .iter()
        .map(|names| names.join(", "))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Prints engine events, with a progress bar for multi-task runs
pub struct RunReporter {
    show_progress: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl RunReporter {
    pub fn new(show_progress: bool) -> Self {
        Self {
            show_progress,
            bar: Mutex::new(None),
        }
    }

    pub fn handle(&self, event: ExecutionEvent) {
        let line = format_execution_event(&event);
        let mut bar = self.bar.lock().unwrap_or_else(|e| e.into_inner());

        if let ExecutionEvent::RunStarted { total_tasks, .. } = &event {
            if self.show_progress && *total_tasks > 1 {
                *bar = Some(create_progress_bar(*total_tasks));
            }
        }

        match bar.as_ref() {
            Some(progress) => progress.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }

        match &event {
            ExecutionEvent::TaskStarted { task } => {
                if let Some(progress) = bar.as_ref() {
                    progress.set_message(task.clone());
                }
            }
            ExecutionEvent::TaskCompleted { .. }
            | ExecutionEvent::TaskFailed { .. }
            | ExecutionEvent::TaskSkipped { .. } => {
                if let Some(progress) = bar.as_ref() {
                    progress.inc(1);
                }
            }
            ExecutionEvent::RunCompleted { .. } => {
                if let Some(progress) = bar.take() {
                    progress.finish_and_clear();
                }
            }
            ExecutionEvent::RunStarted { .. } => {}
        }
    }
}
