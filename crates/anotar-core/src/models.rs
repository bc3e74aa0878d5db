//! Data models for Anotar
//!
//! Defines the task entity and the coercions applied whenever a raw value
//! crosses into it, either from a front end editing a field or from a record
//! decoded off the wire.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Goal used when a goal is added without an explicit target
pub const DEFAULT_GOAL: u64 = 10;

/// Progress value that marks a task without a goal as complete
pub const COMPLETE_PROGRESS: u64 = 100;

/// Errors produced when naming or parsing task fields
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The field name is not part of the task model
    #[error("Unknown task field '{0}'. Valid fields: name, dueDate, priority, progress, goal, description")]
    Unknown(String),

    /// The field exists but can never be edited
    #[error("Task field '{0}' is immutable")]
    Immutable(String),

    /// Not one of low, medium, high, urgent
    #[error("Invalid priority '{0}'. Use low, medium, high or urgent")]
    InvalidPriority(String),
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    /// Wire name of the priority
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    /// Parse a priority, falling back to medium for anything unrecognized
    pub fn parse_lenient(value: &str) -> Self {
        value.parse().unwrap_or_default()
    }
}

impl FromStr for Priority {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(FieldError::InvalidPriority(s.to_string())),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The editable fields of a task
///
/// `id` and `createdAt` are deliberately absent: they are fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskField {
    Name,
    DueDate,
    Priority,
    Progress,
    Goal,
    Description,
}

impl TaskField {
    /// Wire name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskField::Name => "name",
            TaskField::DueDate => "dueDate",
            TaskField::Priority => "priority",
            TaskField::Progress => "progress",
            TaskField::Goal => "goal",
            TaskField::Description => "description",
        }
    }
}

impl FromStr for TaskField {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(TaskField::Name),
            "dueDate" | "due_date" | "due" => Ok(TaskField::DueDate),
            "priority" => Ok(TaskField::Priority),
            "progress" => Ok(TaskField::Progress),
            "goal" => Ok(TaskField::Goal),
            "description" => Ok(TaskField::Description),
            "id" | "createdAt" | "created_at" => Err(FieldError::Immutable(s.to_string())),
            _ => Err(FieldError::Unknown(s.to_string())),
        }
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single task
///
/// Timestamps are kept as the ISO-8601 strings the remote store holds; they
/// are never reformatted on the way through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier, assigned once
    pub id: String,
    /// Display name (may be empty)
    #[serde(default)]
    pub name: String,
    /// Creation timestamp, never changed after creation
    #[serde(default)]
    pub created_at: String,
    /// Optional due date
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// Either 0/100 completion or a running count toward `goal`
    #[serde(default)]
    pub progress: u64,
    /// Zero means "no goal"
    #[serde(default)]
    pub goal: u64,
    #[serde(default)]
    pub description: String,
}

impl Task {
    /// Create a blank task with a fresh id and the current time
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    /// Create a blank task with a specific id
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            created_at: now_timestamp(),
            due_date: None,
            priority: Priority::Medium,
            progress: 0,
            goal: 0,
            description: String::new(),
        }
    }

    /// Build a task from a plain (already decoded) record
    ///
    /// Returns `None` when the record has no usable id. Every other field is
    /// coerced the same way an edit would coerce it.
    pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
        let id = match record.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        let field = |key: &str| record.get(key).unwrap_or(&Value::Null);

        Some(Self {
            id,
            name: coerce_text(field("name")),
            created_at: coerce_text(field("createdAt")),
            due_date: coerce_optional_text(field("dueDate")),
            priority: coerce_priority(field("priority")),
            progress: coerce_count(field("progress")),
            goal: coerce_count(field("goal")),
            description: coerce_text(field("description")),
        })
    }

    /// Return a copy with `value` written into `field`
    pub fn with_field(&self, field: TaskField, value: &Value) -> Self {
        let mut updated = self.clone();
        match field {
            TaskField::Name => updated.name = coerce_text(value),
            TaskField::DueDate => updated.due_date = coerce_optional_text(value),
            TaskField::Priority => updated.priority = coerce_priority(value),
            TaskField::Progress => updated.progress = coerce_count(value),
            TaskField::Goal => updated.goal = coerce_count(value),
            TaskField::Description => updated.description = coerce_text(value),
        }
        updated
    }

    /// Whether progress is measured against a goal
    pub fn has_goal(&self) -> bool {
        self.goal > 0
    }

    /// Whether the task counts as done
    pub fn is_complete(&self) -> bool {
        if self.has_goal() {
            self.progress >= self.goal
        } else {
            self.progress >= COMPLETE_PROGRESS
        }
    }

    /// Progress value that flips the completion state
    pub fn toggled_progress(&self) -> u64 {
        match (self.is_complete(), self.has_goal()) {
            (true, _) => 0,
            (false, true) => self.goal,
            (false, false) => COMPLETE_PROGRESS,
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// Current time in the millisecond-precision UTC form the remote store uses
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Coerce a raw value into a non-negative integer; anything unusable is 0
pub fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Bool(b) => u64::from(*b),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().map(float_to_count))
            .unwrap_or(0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0
            } else {
                s.parse::<f64>().map(float_to_count).unwrap_or(0)
            }
        }
        _ => 0,
    }
}

fn float_to_count(f: f64) -> u64 {
    if f.is_finite() && f > 0.0 {
        f.trunc() as u64
    } else {
        0
    }
}

fn coerce_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_optional_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn coerce_priority(value: &Value) -> Priority {
    value
        .as_str()
        .map(Priority::parse_lenient)
        .unwrap_or_default()
}
