//! Task command handlers

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate};
use serde_json::{json, Value};

use anotar_core::models::DEFAULT_GOAL;
use anotar_core::{DeleteOutcome, Priority, TaskField};

use super::Session;
use crate::output::Output;

/// Options for a new task
#[derive(Debug, Default)]
pub struct NewTask {
    pub name: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    /// `Some(None)` asks for the default goal
    pub goal: Option<Option<u64>>,
}

/// List all tasks
pub async fn list(session: &Session, output: &Output) -> Result<()> {
    session.require_sign_in()?;
    let tasks = session.load().await?;
    output.print_tasks(&tasks);
    Ok(())
}

/// Create a task
pub async fn add(session: &Session, options: NewTask, output: &Output) -> Result<()> {
    session.require_sign_in()?;

    // Validate before anything is created
    let priority = options
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()?;
    let due = options.due.as_deref().map(normalize_due).transpose()?;

    session.load().await?;
    let store = &session.store;
    let task = store.add().await;

    let mut edits: Vec<(TaskField, Value)> = Vec::new();
    if let Some(name) = options.name {
        edits.push((TaskField::Name, json!(name)));
    }
    if let Some(description) = options.description {
        edits.push((TaskField::Description, json!(description)));
    }
    if let Some(priority) = priority {
        edits.push((TaskField::Priority, json!(priority.as_str())));
    }
    if let Some(due) = due {
        edits.push((TaskField::DueDate, json!(due)));
    }
    if let Some(goal) = options.goal {
        edits.push((TaskField::Goal, json!(goal.unwrap_or(DEFAULT_GOAL))));
    }

    let mut current = task;
    for (field, value) in edits {
        if let Some(updated) = store.set_task(&current.id, field, value).await {
            current = updated;
        }
    }

    session.finish(output).await;

    if output.is_quiet() || output.is_json() {
        output.print_task(&current);
    } else {
        output.success(&format!("Created task {}", current.id));
    }
    Ok(())
}

/// Set one field of a task
pub async fn set(
    session: &Session,
    id: String,
    field: String,
    value: String,
    output: &Output,
) -> Result<()> {
    session.require_sign_in()?;
    let field: TaskField = field.parse()?;
    let value = field_value(field, &value)?;

    session.load().await?;
    let task = session.store.find(&id)?;
    let updated = session.store.set_task(&task.id, field, value).await;
    session.finish(output).await;

    let Some(updated) = updated else {
        bail!("Task disappeared while editing: {}", task.id);
    };
    if output.is_quiet() || output.is_json() {
        output.print_task(&updated);
    } else {
        output.success(&format!("Updated {} of task {}", field, updated.id));
    }
    Ok(())
}

/// Toggle a task between complete and incomplete
pub async fn done(session: &Session, id: String, output: &Output) -> Result<()> {
    session.require_sign_in()?;
    session.load().await?;
    let task = session.store.find(&id)?;
    let updated = session.store.toggle_complete(&task.id).await;
    session.finish(output).await;

    let Some(updated) = updated else {
        bail!("Task disappeared while editing: {}", task.id);
    };
    let state = if updated.is_complete() {
        "complete"
    } else {
        "incomplete"
    };
    output.success(&format!("Marked task {} {}", updated.id, state));
    Ok(())
}

/// Delete a task
pub async fn delete(session: &Session, id: String, output: &Output) -> Result<()> {
    session.require_sign_in()?;
    session.load().await?;
    let task = session.store.find(&id)?;

    match session.store.delete_task(&task.id).await {
        DeleteOutcome::Deleted => {
            output.success(&format!("Deleted task {}", task.id));
        }
        DeleteOutcome::NotFound => bail!("Task not found: {}", task.id),
        DeleteOutcome::Skipped => bail!("Not signed in. Run `anotar login` first."),
        DeleteOutcome::SignedOut => {
            output.warn("Your session has expired and you have been signed out.");
            bail!(
                "Task {} was not deleted on the server. Sign in again with `anotar login`.",
                task.id
            );
        }
        DeleteOutcome::RolledBack { reason } => {
            bail!(
                "Failed to delete task {}: {}. Please try again.",
                task.id,
                reason
            );
        }
    }
    session.finish(output).await;
    Ok(())
}

/// Validate a raw value for `field`; priorities and due dates are checked,
/// everything else goes through [`parse_value`]
pub fn field_value(field: TaskField, raw: &str) -> Result<Value> {
    Ok(match field {
        TaskField::Priority => json!(raw.parse::<Priority>()?.as_str()),
        TaskField::DueDate if !raw.trim().is_empty() => json!(normalize_due(raw)?),
        _ => parse_value(raw),
    })
}

/// Interpret a command-line value: JSON when it parses, plain text otherwise
pub fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Accept a calendar date or a full timestamp; dates become midnight UTC
pub fn normalize_due(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(format!("{}T00:00:00.000Z", date.format("%Y-%m-%d")));
    }
    DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid due date '{}'. Use YYYY-MM-DD or RFC 3339.", raw))?;
    Ok(raw.to_string())
}
