//! Anotar Core Library
//!
//! This crate provides the synchronization engine for Anotar, a personal
//! task list backed by a remote task store reachable over an authenticated
//! HTTP API.
//!
//! # Architecture
//!
//! - **Optimistic edits**: every change lands in memory and is broadcast to
//!   observers before any network call
//! - **Immediate push**: the edited task is sent to the remote store right away
//! - **Periodic flush**: a timer re-pushes the whole list while changes are
//!   pending, retrying anything an immediate push missed
//!
//! # Quick Start
//!
//! ```text
//! let credentials = Arc::new(TokenFile::from_config(&config));
//! let remote = Arc::new(HttpRemoteClient::new(endpoint, credentials.clone())?);
//! let store = TaskStore::new(remote, credentials);
//!
//! store.load().await?;
//! let task = store.add().await;
//! store.set_task(&task.id, TaskField::Name, json!("Water the plants")).await;
//! ```
//!
//! # Modules
//!
//! - `store`: The sync engine (main entry point)
//! - `collection`: Ordered in-memory task list and sync flags
//! - `notifier`: Observer registry
//! - `remote`: Remote task store client and typed-attribute decoding
//! - `sync`: Periodic flush timer
//! - `credentials`: Session token providers and hosted sign-in helpers
//! - `models`: Task data structures
//! - `config`: Application configuration

pub mod collection;
pub mod config;
pub mod credentials;
pub mod models;
pub mod notifier;
pub mod remote;
pub mod store;
pub mod sync;

pub use collection::{LookupError, TaskCollection};
pub use config::Config;
pub use credentials::{
    parse_callback, AuthSettings, CallbackTokens, CredentialProvider, StaticCredentials, TokenFile,
};
pub use models::{FieldError, Priority, Task, TaskField};
pub use notifier::{Notifier, Subscription, SyncStatus};
pub use remote::{HttpRemoteClient, RemoteError, RemoteStore};
pub use store::{DeleteOutcome, FlushReport, TaskStore};
