//! Remote task store
//!
//! ## Contract
//!
//! | Operation | Request | Success |
//! |---|---|---|
//! | list | `GET /tasks` | array, or `{Items: [...]}` with typed attributes |
//! | upsert | `POST /tasks`, every attribute string-encoded | 2xx, body ignored |
//! | remove | `DELETE /tasks/{id}` | 2xx |
//!
//! Without a session token, `list` yields nothing and `upsert`/`remove` are
//! skipped without touching the network.

pub mod attribute;
mod client;
mod error;

use async_trait::async_trait;

use crate::models::Task;

pub use client::HttpRemoteClient;
pub use error::{RemoteError, RemoteResult};

/// Operations the sync engine needs from the remote store
///
/// Writes are idempotent by id (last write wins), so pushing the same task
/// twice, or from two producers at once, is safe.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch every task
    async fn list(&self) -> RemoteResult<Vec<Task>>;

    /// Create or overwrite a task
    async fn upsert(&self, task: &Task) -> RemoteResult<()>;

    /// Delete a task by id
    async fn remove(&self, id: &str) -> RemoteResult<()>;
}
