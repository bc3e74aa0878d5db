//! Authoritative in-memory task list
//!
//! Order is display order: load order first, then creation order. Edits
//! replace a task by value rather than mutating it in place, so snapshots
//! handed out earlier never change underneath their holders.
//!
//! The collection also carries the two sync flags. `pending_mutations` is
//! collection-wide: a periodic flush re-pushes every task, so there is no
//! per-task dirty tracking.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::models::{Task, TaskField};
use crate::notifier::SyncStatus;

/// Failure to resolve a task by id or id prefix
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Ambiguous task id '{prefix}' matches {matches} tasks")]
    Ambiguous { prefix: String, matches: usize },
}

/// Ordered task list plus sync flags
#[derive(Debug, Default)]
pub struct TaskCollection {
    tasks: Vec<Task>,
    pending_mutations: bool,
    push_in_flight: bool,
}

impl TaskCollection {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly loaded list
    ///
    /// A fresh load is in sync by definition, so pending mutations are
    /// cleared. Duplicate ids keep their first occurrence.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        let mut unique: Vec<Task> = Vec::with_capacity(tasks.len());
        for task in tasks {
            if unique.iter().any(|t| t.id == task.id) {
                warn!(task_id = %task.id, "Dropping duplicate task from load");
                continue;
            }
            unique.push(task);
        }
        self.tasks = unique;
        self.pending_mutations = false;
    }

    /// Add a task at the end
    pub fn append(&mut self, task: Task) {
        self.tasks.push(task);
        self.pending_mutations = true;
    }

    /// Write a raw value into one field of a task
    ///
    /// Returns the updated task, or `None` (and changes nothing) if no task
    /// has that id.
    pub fn set_field(&mut self, id: &str, field: TaskField, value: &Value) -> Option<Task> {
        let index = self.position(id)?;
        let updated = self.tasks[index].with_field(field, value);
        self.tasks[index] = updated.clone();
        self.pending_mutations = true;
        Some(updated)
    }

    /// Remove a task, returning the full list as it was before
    ///
    /// The returned list lets the caller restore it if the remote delete
    /// fails. Pending mutations are left as they are.
    pub fn remove(&mut self, id: &str) -> Vec<Task> {
        let previous = self.tasks.clone();
        self.tasks.retain(|t| t.id != id);
        previous
    }

    /// Put back a list returned by [`remove`](Self::remove)
    pub fn restore(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
    }

    /// Copy of the current list
    pub fn snapshot(&self) -> Vec<Task> {
        self.tasks.clone()
    }

    /// Task by exact id
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// First task, in display order, whose id is not in `skip`
    pub fn first_not_in(&self, skip: &HashSet<String>) -> Option<&Task> {
        self.tasks.iter().find(|t| !skip.contains(&t.id))
    }

    /// Task by exact id, or by a prefix matching exactly one id
    pub fn resolve(&self, id_or_prefix: &str) -> Result<&Task, LookupError> {
        if let Some(task) = self.get(id_or_prefix) {
            return Ok(task);
        }

        let mut matches = self
            .tasks
            .iter()
            .filter(|t| !id_or_prefix.is_empty() && t.id.starts_with(id_or_prefix));
        match (matches.next(), matches.count()) {
            (Some(task), 0) => Ok(task),
            (Some(_), rest) => Err(LookupError::Ambiguous {
                prefix: id_or_prefix.to_string(),
                matches: rest + 1,
            }),
            (None, _) => Err(LookupError::NotFound(id_or_prefix.to_string())),
        }
    }

    pub fn has_pending_mutations(&self) -> bool {
        self.pending_mutations
    }

    /// Mark a batch push as started
    ///
    /// Returns `false`, changing nothing, when there is nothing to push or a
    /// push is already running.
    pub fn begin_push(&mut self) -> bool {
        if !self.pending_mutations || self.push_in_flight {
            return false;
        }
        self.push_in_flight = true;
        true
    }

    /// Mark a batch push as finished
    ///
    /// Clears pending mutations whether or not every task made it.
    pub fn finish_push(&mut self) {
        self.pending_mutations = false;
        self.push_in_flight = false;
    }

    /// Current sync flags
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            syncing: self.push_in_flight,
            pending_mutations: self.pending_mutations,
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }
}
