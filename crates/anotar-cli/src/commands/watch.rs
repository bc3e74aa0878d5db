//! Watch command handler
//!
//! Keeps the sync engine running in the foreground. Every snapshot is
//! printed, and edits typed on stdin (one per line, `help` lists them) are applied
//! locally and pushed. The autosave timer flushes pending changes on the
//! configured interval, and Ctrl-C flushes once more before exiting.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use anotar_core::{DeleteOutcome, TaskField};

use super::task::field_value;
use super::Session;
use crate::output::Output;

const HELP: &str = "Commands:
  add [name]                  create a task
  set <id> <field> <value>    set one field of a task
  done <id>                   toggle a task complete
  delete <id>                 delete a task
  list                        print the task list
  help                        show this help";

/// One line typed while watching
#[derive(Debug, PartialEq)]
enum Edit {
    Add(Option<String>),
    Set {
        id: String,
        field: TaskField,
        value: Value,
    },
    Toggle(String),
    Delete(String),
    List,
    Help,
}

/// Run autosave until interrupted
pub async fn watch(session: &Session, output: Arc<Output>) -> Result<()> {
    session.require_sign_in()?;

    let printer = Arc::clone(&output);
    let _subscription = session
        .store
        .subscribe(move |tasks, status| printer.print_update(tasks, status));

    let tasks = session.load().await?;
    output.print_tasks(&tasks);

    let interval = session.config.sync_interval();
    session.store.start_autosave(interval);
    info!(interval_secs = interval.as_secs(), "Watching for changes");
    output.message(&format!(
        "Syncing every {}s. Type `help` for commands, Ctrl-C to stop.",
        interval.as_secs()
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                signal.context("Failed to listen for Ctrl-C")?;
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    let applied = match parse_edit(&line) {
                        Ok(Some(edit)) => apply(session, edit, &output).await,
                        Ok(None) => Ok(()),
                        Err(e) => Err(e),
                    };
                    if let Err(e) = applied {
                        output.warn(&format!("{:#}", e));
                    }
                }
                // Stdin closed: keep syncing until Ctrl-C
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Stopped reading edits from stdin");
                    stdin_open = false;
                }
            },
        }
    }

    session.store.stop_autosave();
    session.finish(&output).await;
    output.message("Stopped.");
    Ok(())
}

/// Parse one input line; blank lines yield `None`
fn parse_edit(line: &str) -> Result<Option<Edit>> {
    let (command, rest) = split_word(line);
    let edit = match command {
        "" => return Ok(None),
        "add" => Edit::Add((!rest.is_empty()).then(|| rest.to_string())),
        "set" => {
            let (id, rest) = split_word(rest);
            let (field, value) = split_word(rest);
            if id.is_empty() || field.is_empty() {
                bail!("Usage: set <id> <field> <value>");
            }
            let field: TaskField = field.parse()?;
            Edit::Set {
                id: id.to_string(),
                field,
                value: field_value(field, value)?,
            }
        }
        "done" => Edit::Toggle(required_id(rest, "done")?),
        "delete" | "rm" => Edit::Delete(required_id(rest, "delete")?),
        "list" | "ls" => Edit::List,
        "help" | "?" => Edit::Help,
        other => bail!("Unknown command '{}'. Type `help` for commands.", other),
    };
    Ok(Some(edit))
}

async fn apply(session: &Session, edit: Edit, output: &Output) -> Result<()> {
    let store = &session.store;
    match edit {
        Edit::Add(name) => {
            let task = store.add().await;
            if let Some(name) = name {
                store.set_task(&task.id, TaskField::Name, json!(name)).await;
            }
            output.success(&format!("Created task {}", task.id));
        }
        Edit::Set { id, field, value } => {
            let task = store.find(&id)?;
            if store.set_task(&task.id, field, value).await.is_none() {
                bail!("Task disappeared while editing: {}", task.id);
            }
        }
        Edit::Toggle(id) => {
            let task = store.find(&id)?;
            if store.toggle_complete(&task.id).await.is_none() {
                bail!("Task disappeared while editing: {}", task.id);
            }
        }
        Edit::Delete(id) => {
            let task = store.find(&id)?;
            match store.delete_task(&task.id).await {
                DeleteOutcome::Deleted => output.success(&format!("Deleted task {}", task.id)),
                DeleteOutcome::NotFound => bail!("Task not found: {}", task.id),
                DeleteOutcome::Skipped | DeleteOutcome::SignedOut => {
                    bail!("Not signed in. Run `anotar login` first.")
                }
                DeleteOutcome::RolledBack { reason } => {
                    bail!("Failed to delete task {}: {}", task.id, reason)
                }
            }
        }
        Edit::List => output.print_tasks(&store.snapshot()),
        Edit::Help => output.message(HELP),
    }
    Ok(())
}

fn required_id(rest: &str, command: &str) -> Result<String> {
    let (id, _) = split_word(rest);
    if id.is_empty() {
        bail!("Usage: {} <id>", command);
    }
    Ok(id.to_string())
}

/// First whitespace-separated word and the trimmed remainder
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}
