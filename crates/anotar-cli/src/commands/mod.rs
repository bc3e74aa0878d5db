//! Command handlers

pub mod auth;
pub mod config;
pub mod status;
pub mod task;
pub mod watch;

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;

use anotar_core::{Config, CredentialProvider, HttpRemoteClient, Task, TaskStore, TokenFile};

use crate::output::Output;

/// Everything a task command needs: configuration, session and sync engine
pub struct Session {
    pub config: Config,
    pub credentials: Arc<TokenFile>,
    pub store: TaskStore,
}

impl Session {
    /// Build the sync engine from the configuration
    pub fn open(config: Config) -> Result<Self> {
        let Some(endpoint) = config.api_endpoint.clone() else {
            bail!(
                "API endpoint not configured. Set it with:\n  \
                 anotar config set api_endpoint https://your-api.example.com/prod"
            );
        };

        let credentials = Arc::new(TokenFile::from_config(&config));
        let remote = HttpRemoteClient::new(&endpoint, credentials.clone())
            .with_context(|| format!("Invalid api_endpoint: {}", endpoint))?;
        let store = TaskStore::new(Arc::new(remote), credentials.clone());
        debug!(endpoint = %endpoint, "Opened session");

        Ok(Self {
            config,
            credentials,
            store,
        })
    }

    pub fn is_signed_in(&self) -> bool {
        self.credentials.token().is_some()
    }

    /// Fail unless a session token is stored
    pub fn require_sign_in(&self) -> Result<()> {
        if !self.is_signed_in() {
            bail!("Not signed in. Run `anotar login` first.");
        }
        Ok(())
    }

    /// Load the task list, turning failures into user-facing errors
    pub async fn load(&self) -> Result<Vec<Task>> {
        match self.store.load().await {
            Ok(tasks) => Ok(tasks),
            Err(e) if e.is_auth_failure() => Err(anyhow!(e).context(
                "Your session has expired and you have been signed out. \
                 Sign in again with `anotar login`.",
            )),
            Err(e) if e.is_network() => Err(anyhow!(e).context(
                "Could not reach the task server. Check your connection and try again.",
            )),
            Err(e) => Err(anyhow!(e).context("Failed to load tasks. Please try again.")),
        }
    }

    /// Push pending changes before exiting
    ///
    /// A flush uploads every task in the list, one request each, so a single
    /// edit on a list of N tasks costs N requests.
    pub async fn finish(&self, output: &Output) {
        if let Some(report) = self.store.flush().await {
            if report.failed > 0 {
                output.warn(&format!(
                    "{} task(s) could not be saved; they will be pushed on the next sync",
                    report.failed
                ));
            }
        }
    }
}
