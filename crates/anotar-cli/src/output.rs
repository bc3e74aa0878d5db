//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use serde::Serialize;
use tracing::error;

use anotar_core::{SyncStatus, Task};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single task
    pub fn print_task(&self, task: &Task) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:          {}", task.id);
                println!("Name:        {}", display_name(task));
                println!("Priority:    {}", task.priority);
                println!("Progress:    {}", format_progress(task));
                if let Some(ref due) = task.due_date {
                    println!("Due:         {}", due);
                }
                if !task.description.is_empty() {
                    println!("Description: {}", task.description);
                }
                println!("Created:     {}", task.created_at);
            }
            OutputFormat::Json => print_json(task),
            OutputFormat::Quiet => println!("{}", task.id),
        }
    }

    /// Print the task list
    pub fn print_tasks(&self, tasks: &[Task]) {
        match self.format {
            OutputFormat::Human => {
                if tasks.is_empty() {
                    println!("No tasks.");
                    return;
                }
                for task in tasks {
                    let check = if task.is_complete() { "x" } else { " " };
                    let due = task
                        .due_date
                        .as_deref()
                        .map(|d| format!(" | due {}", truncate(d, 10)))
                        .unwrap_or_default();
                    println!(
                        "{} | [{}] {} | {} | {}{}",
                        short_id(&task.id),
                        check,
                        truncate(&display_name(task), 40),
                        task.priority,
                        format_progress(task),
                        due
                    );
                }
                println!("\n{} task(s)", tasks.len());
            }
            OutputFormat::Json => print_json(&tasks),
            OutputFormat::Quiet => {
                for task in tasks {
                    println!("{}", task.id);
                }
            }
        }
    }

    /// Print a one-line summary of a snapshot, for live updates
    pub fn print_update(&self, tasks: &[Task], status: SyncStatus) {
        match self.format {
            OutputFormat::Human => {
                let done = tasks.iter().filter(|t| t.is_complete()).count();
                println!(
                    "{} task(s), {} complete{}",
                    tasks.len(),
                    done,
                    format_status(status)
                );
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"tasks": tasks, "status": status})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning to stderr (suppressed in quiet mode)
    pub fn warn(&self, msg: &str) {
        if !self.is_quiet() {
            eprintln!("⚠ {}", msg);
        }
    }
}

/// Pretty-print a value as JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "Failed to serialize output"),
    }
}

/// Progress as "n/goal" for counted tasks, "n%" otherwise
pub fn format_progress(task: &Task) -> String {
    if task.has_goal() {
        format!("{}/{}", task.progress, task.goal)
    } else {
        format!("{}%", task.progress)
    }
}

fn format_status(status: SyncStatus) -> &'static str {
    match (status.syncing, status.pending_mutations) {
        (true, _) => " (syncing)",
        (false, true) => " (unsaved changes)",
        (false, false) => "",
    }
}

fn display_name(task: &Task) -> String {
    if task.name.is_empty() {
        "(untitled)".to_string()
    } else {
        task.name.clone()
    }
}

/// First eight characters of an id
fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
