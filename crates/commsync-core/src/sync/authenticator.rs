use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{SyncAuthError, SyncAuthResult, WebhookAuthClient};
use crate::auth::PermissionGrant;
use crate::util::{unix_timestamp_now, user_fingerprint};

/// Supplies a fresh platform access token on demand.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> SyncAuthResult<String>;
}

/// Token provider returning a fixed token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> SyncAuthResult<String> {
        if self.token.trim().is_empty() {
            return Err(SyncAuthError::TokenProvider(
                "no access token available".to_string(),
            ));
        }
        Ok(self.token.clone())
    }
}

/// Called by a transport whenever it needs credentials.
#[async_trait]
pub trait AuthHandler: Send + Sync {
    async fn authenticate(&self) -> SyncAuthResult<PermissionGrant>;
}

/// Authenticates through the auth webhook and caches the resulting grant.
///
/// Invocations are serialized: a second caller waits for the in-flight
/// exchange before starting its own.
pub struct WebhookAuthenticator {
    client: WebhookAuthClient,
    client_id: String,
    token_provider: Arc<dyn TokenProvider>,
    grant: Mutex<Option<PermissionGrant>>,
}

impl WebhookAuthenticator {
    pub fn new(
        client: WebhookAuthClient,
        client_id: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client,
            client_id: client_id.into(),
            token_provider,
            grant: Mutex::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn endpoint(&self) -> &str {
        self.client.endpoint()
    }

    pub async fn current_grant(&self) -> Option<PermissionGrant> {
        self.grant.lock().await.clone()
    }

    /// True when there is no grant or it lapses within `window`.
    pub async fn expires_within(&self, window: Duration) -> bool {
        self.grant
            .lock()
            .await
            .as_ref()
            .map_or(true, |grant| {
                grant.expires_within(window, unix_timestamp_now())
            })
    }

    /// Drop the cached grant.
    pub async fn logout(&self) {
        self.grant.lock().await.take();
    }
}

impl fmt::Debug for WebhookAuthenticator {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("WebhookAuthenticator")
            .field("endpoint", &self.client.endpoint())
            .field("client_id", &self.client_id)
            .field("token_provider", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AuthHandler for WebhookAuthenticator {
    async fn authenticate(&self) -> SyncAuthResult<PermissionGrant> {
        let mut slot = self.grant.lock().await;

        let result = match self.token_provider.access_token().await {
            Ok(token) => self.client.exchange_token(&token, &self.client_id).await,
            Err(error) => Err(error),
        };

        match result {
            Ok(grant) => {
                tracing::info!(
                    user = user_fingerprint(&grant.user_id),
                    client_id = %self.client_id,
                    expires_at = grant.expires_at,
                    "Sync authentication succeeded"
                );
                *slot = Some(grant.clone());
                Ok(grant)
            }
            Err(error) => {
                tracing::warn!(
                    client_id = %self.client_id,
                    "Sync authentication failed: {}",
                    error
                );
                slot.take();
                Err(error)
            }
        }
    }
}
