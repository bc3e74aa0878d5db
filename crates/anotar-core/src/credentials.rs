//! Credential providers
//!
//! The engine never stores a session itself. It asks a [`CredentialProvider`]
//! for the current token before every remote call and tells it to sign out
//! when the remote store reports the session as expired.
//!
//! Two providers ship with the crate:
//! - [`StaticCredentials`]: token held in memory (tests, embedding)
//! - [`TokenFile`]: token persisted in the data directory (CLI)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::Config;

/// Source of the bearer token used for remote calls
pub trait CredentialProvider: Send + Sync {
    /// Current token, or `None` when unauthenticated
    fn token(&self) -> Option<String>;

    /// Invalidate the session
    fn sign_out(&self);
}

/// In-memory credentials
#[derive(Debug, Default)]
pub struct StaticCredentials {
    token: RwLock<Option<String>>,
}

impl StaticCredentials {
    /// Credentials holding the given token
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
        }
    }

    /// Credentials with no token
    pub fn anonymous() -> Self {
        Self::default()
    }

    fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }
}

impl CredentialProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn sign_out(&self) {
        info!("Signing out (in-memory session)");
        self.set_token(None);
    }
}

/// Token persisted in a file
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    /// Use the token file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the token file location from the configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.token_path())
    }

    /// Path of the token file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist a token, replacing any previous one
    pub fn store(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }
        fs::write(&self.path, token.trim())
            .with_context(|| format!("Failed to write token file: {:?}", self.path))?;
        debug!(path = %self.path.display(), "Stored session token");
        Ok(())
    }
}

impl CredentialProvider for TokenFile {
    fn token(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let token = content.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to read token file");
                }
                None
            }
        }
    }

    fn sign_out(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("Signed out, removed {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to remove token file"),
        }
    }
}

/// Hosted sign-in settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSettings {
    /// Base URL of the hosted sign-in domain
    pub domain: String,
    /// OAuth client id
    pub client_id: String,
    /// Where the hosted UI sends the user back to
    pub redirect_uri: String,
}

impl AuthSettings {
    /// Settings from the configuration, if the domain and client id are set
    pub fn from_config(config: &Config) -> Option<Self> {
        Some(Self {
            domain: config.auth_domain.clone()?,
            client_id: config.client_id.clone()?,
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// Hosted UI login URL (implicit grant, token returned in the fragment)
    pub fn login_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/login", self.domain.trim_end_matches('/')),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "token"),
                ("scope", "email openid"),
                ("redirect_uri", self.redirect_uri.as_str()),
            ],
        )
        .with_context(|| format!("Invalid auth domain: {}", self.domain))?;
        Ok(url.into())
    }

    /// Hosted UI logout URL
    pub fn logout_url(&self) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/logout", self.domain.trim_end_matches('/')),
            &[
                ("client_id", self.client_id.as_str()),
                ("logout_uri", self.redirect_uri.as_str()),
            ],
        )
        .with_context(|| format!("Invalid auth domain: {}", self.domain))?;
        Ok(url.into())
    }
}

/// Tokens carried back from the hosted UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTokens {
    pub id_token: String,
    pub access_token: Option<String>,
}

/// Extract tokens from a callback URL or its bare `#fragment`
pub fn parse_callback(input: &str) -> Option<CallbackTokens> {
    let input = input.trim();
    let fragment = match input.split_once('#') {
        Some((_, fragment)) => fragment,
        None => input,
    };
    if fragment.is_empty() {
        return None;
    }

    let mut carrier = Url::parse("http://localhost/").ok()?;
    carrier.set_query(Some(fragment));

    let mut id_token = None;
    let mut access_token = None;
    for (key, value) in carrier.query_pairs() {
        match key.as_ref() {
            "id_token" if !value.is_empty() => id_token = Some(value.into_owned()),
            "access_token" if !value.is_empty() => access_token = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(CallbackTokens {
        id_token: id_token?,
        access_token,
    })
}
