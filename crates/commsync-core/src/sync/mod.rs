//! Sync session lifecycle and the auth webhook token exchange client.

mod authenticator;
mod session;
mod transport;

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::auth::{AuthWebhookRequest, AuthWebhookResponse, PermissionGrant};
use crate::util::{compact_text, is_http_url, normalize_text_option};

pub use authenticator::{AuthHandler, StaticTokenProvider, TokenProvider, WebhookAuthenticator};
pub use session::{SessionError, SessionIdentity, SessionResult, SyncSession, SyncSessionManager};
pub use transport::{
    LoopbackTransport, LoopbackTransportFactory, SyncTransport, TransportError, TransportFactory,
};

/// Header carrying the client id alongside the JSON body.
pub const CLIENT_ID_HEADER: &str = "x-sync-client-id";

/// Client-id header sent by older SDK builds; accepted by the webhook only.
pub const LEGACY_CLIENT_ID_HEADER: &str = "x-ditto-client-id";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum SyncAuthError {
    #[error("Invalid sync auth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Sync auth HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync auth API error: {0}")]
    Api(String),
    #[error("Sync auth denied: {0}")]
    Denied(String),
    #[error("Invalid sync auth payload: {0}")]
    InvalidPayload(String),
    #[error("Access token unavailable: {0}")]
    TokenProvider(String),
}

pub type SyncAuthResult<T> = Result<T, SyncAuthError>;

/// Client for the auth webhook that turns a platform access token into a
/// permission grant.
#[derive(Debug, Clone)]
pub struct WebhookAuthClient {
    endpoint: String,
    client: reqwest::Client,
}

impl WebhookAuthClient {
    pub fn new(endpoint: impl Into<String>) -> SyncAuthResult<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> SyncAuthResult<Self> {
        let endpoint = normalize_endpoint(endpoint.into())?;
        Ok(Self {
            endpoint,
            client: reqwest::Client::builder().timeout(timeout).build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn exchange_token(
        &self,
        access_token: &str,
        client_id: &str,
    ) -> SyncAuthResult<PermissionGrant> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(SyncAuthError::InvalidConfiguration(
                "access token must not be empty".to_string(),
            ));
        }

        let request = AuthWebhookRequest {
            token: Some(access_token.to_string()),
            client_id: Some(client_id.to_string()),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .header(CLIENT_ID_HEADER, client_id)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncAuthError::Api(parse_api_error(status, &body)));
        }

        let payload = response.json::<AuthWebhookResponse>().await?;
        grant_from_response(payload)
    }
}

fn grant_from_response(payload: AuthWebhookResponse) -> SyncAuthResult<PermissionGrant> {
    if !payload.authenticated {
        let reason = payload
            .error
            .unwrap_or_else(|| "webhook did not authenticate the user".to_string());
        return Err(SyncAuthError::Denied(reason));
    }

    payload.into_grant().ok_or_else(|| {
        SyncAuthError::InvalidPayload("response did not include userId/expiresAt".to_string())
    })
}

#[derive(Debug, Deserialize)]
struct SyncAuthErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SyncAuthErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

fn normalize_endpoint(raw: String) -> SyncAuthResult<String> {
    let endpoint = normalize_text_option(Some(raw)).ok_or_else(|| {
        SyncAuthError::InvalidConfiguration("endpoint must not be empty".to_string())
    })?;
    if is_http_url(&endpoint) {
        Ok(endpoint.trim_end_matches('/').to_string())
    } else {
        Err(SyncAuthError::InvalidConfiguration(
            "endpoint must include http:// or https://".to_string(),
        ))
    }
}
