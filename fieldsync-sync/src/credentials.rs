//! Bearer credential providers.
//!
//! Authentication lives outside this crate. The remote client asks the
//! provider for a token on every call, so a refreshed session takes effect
//! without rebuilding anything.

use crate::error::SyncResult;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Environment variable read by [`StaticToken::from_env`].
pub const TOKEN_ENV: &str = "FIELDSYNC_TOKEN";

/// Supplies the bearer credential attached to outbound calls.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// The current token, or `None` to send the request unauthenticated.
    async fn bearer_token(&self) -> SyncResult<Option<String>>;
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Reads the token from `FIELDSYNC_TOKEN`, if set.
    pub fn from_env() -> Option<Self> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(Self::new)
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn bearer_token(&self) -> SyncResult<Option<String>> {
        Ok(Some(self.0.clone()))
    }
}

/// Sends requests without an `Authorization` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentials;

#[async_trait]
impl CredentialProvider for NoCredentials {
    async fn bearer_token(&self) -> SyncResult<Option<String>> {
        Ok(None)
    }
}

/// A token the session layer can swap at runtime.
#[derive(Debug, Clone, Default)]
pub struct SessionToken {
    token: Arc<RwLock<Option<String>>>,
}

impl SessionToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a new token (after sign-in or refresh).
    pub async fn set(&self, token: impl Into<String>) {
        *self.token.write().await = Some(token.into());
    }

    /// Drops the token (after sign-out).
    pub async fn clear(&self) {
        *self.token.write().await = None;
    }
}

#[async_trait]
impl CredentialProvider for SessionToken {
    async fn bearer_token(&self) -> SyncResult<Option<String>> {
        Ok(self.token.read().await.clone())
    }
}
