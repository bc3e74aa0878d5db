//! HTTP client for the remote task store
//!
//! Talks to `{endpoint}/tasks`. Every request carries the session token in
//! the `Authorization` header, exactly as issued by the hosted sign-in.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Response, Url};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::attribute::decode_item;
use super::error::{RemoteError, RemoteResult};
use super::RemoteStore;
use crate::credentials::CredentialProvider;
use crate::models::{now_timestamp, Task};

/// Remote task store reached over HTTP
pub struct HttpRemoteClient {
    http: reqwest::Client,
    tasks_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpRemoteClient {
    /// Create a client for the API rooted at `endpoint`
    pub fn new(endpoint: &str, credentials: Arc<dyn CredentialProvider>) -> RemoteResult<Self> {
        let tasks_url = Url::parse(&format!("{}/tasks", endpoint.trim_end_matches('/')))
            .map_err(|_| RemoteError::InvalidEndpoint(endpoint.to_string()))?;
        if tasks_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidEndpoint(endpoint.to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            tasks_url,
            credentials,
        })
    }

    /// URL of the task collection
    pub fn tasks_url(&self) -> &Url {
        &self.tasks_url
    }

    fn task_url(&self, id: &str) -> Url {
        let mut url = self.tasks_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(id);
        }
        url
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteClient {
    async fn list(&self) -> RemoteResult<Vec<Task>> {
        let Some(token) = self.credentials.token() else {
            warn!("Not listing tasks: no session token");
            return Ok(Vec::new());
        };

        let response = self
            .http
            .get(self.tasks_url.clone())
            .header(AUTHORIZATION, token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;
        let response = check_status(response).await?;

        let body = response.text().await?;
        let body: Value =
            serde_json::from_str(&body).map_err(|e| RemoteError::Decode(e.to_string()))?;
        let tasks = parse_list(body);
        debug!(count = tasks.len(), "Listed tasks from remote store");
        Ok(tasks)
    }

    async fn upsert(&self, task: &Task) -> RemoteResult<()> {
        let Some(token) = self.credentials.token() else {
            debug!(task_id = %task.id, "Not pushing task: no session token");
            return Ok(());
        };

        let response = self
            .http
            .post(self.tasks_url.clone())
            .header(AUTHORIZATION, token)
            .json(&UpsertPayload::from(task))
            .send()
            .await?;
        check_status(response).await?;
        debug!(task_id = %task.id, "Pushed task");
        Ok(())
    }

    async fn remove(&self, id: &str) -> RemoteResult<()> {
        let Some(token) = self.credentials.token() else {
            debug!(task_id = %id, "Not deleting task: no session token");
            return Ok(());
        };

        let response = self
            .http
            .delete(self.task_url(id))
            .header(AUTHORIZATION, token)
            .send()
            .await?;
        check_status(response).await?;
        debug!(task_id = %id, "Deleted task");
        Ok(())
    }
}

/// Write form of a task: every attribute as a string
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpsertPayload<'a> {
    id: &'a str,
    name: &'a str,
    created_at: String,
    priority: &'static str,
    progress: String,
    description: &'a str,
    goal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    due_date: Option<&'a str>,
}

impl<'a> From<&'a Task> for UpsertPayload<'a> {
    fn from(task: &'a Task) -> Self {
        let created_at = if task.created_at.is_empty() {
            now_timestamp()
        } else {
            task.created_at.clone()
        };

        Self {
            id: &task.id,
            name: &task.name,
            created_at,
            priority: task.priority.as_str(),
            progress: task.progress.to_string(),
            description: &task.description,
            goal: task.goal.to_string(),
            due_date: task.due_date.as_deref(),
        }
    }
}

/// Turn a non-success response into a [`RemoteError::Remote`]
async fn check_status(response: Response) -> RemoteResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    // Error bodies are best effort; anything unparseable counts as empty
    let body: Value = response
        .json()
        .await
        .unwrap_or_else(|_| Value::Object(Map::new()));
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Status {}", status.as_u16()));

    warn!(status = status.as_u16(), %message, "Remote store request failed");
    Err(RemoteError::Remote {
        status: status.as_u16(),
        message,
    })
}

/// Extract tasks from a list response
///
/// Accepts a bare array of plain records or an object whose `Items` array
/// holds typed-attribute records. Anything else yields no tasks.
pub(crate) fn parse_list(body: Value) -> Vec<Task> {
    let records: Vec<Map<String, Value>> = match body {
        Value::Array(items) => items.into_iter().filter_map(into_object).collect(),
        Value::Object(mut envelope) => match envelope.remove("Items") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(into_object)
                .map(decode_item)
                .collect(),
            _ => {
                warn!("List response has no Items array");
                Vec::new()
            }
        },
        _ => {
            warn!("List response is neither an array nor an object");
            Vec::new()
        }
    };

    records
        .iter()
        .filter_map(|record| {
            let task = Task::from_record(record);
            if task.is_none() {
                warn!("Skipping task record without an id");
            }
            task
        })
        .collect()
}

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
