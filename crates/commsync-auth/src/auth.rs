use std::sync::Arc;

use async_trait::async_trait;
use commsync_core::auth::{MemberRole, TenantMembership};
use commsync_core::util::compact_text;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::{AppConfig, SupabaseCredentials};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub user_id: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("Upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid upstream payload: {0}")]
    Payload(String),
}

/// Resolves a platform access token to the user it belongs to.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_token(&self, token: &str) -> Result<VerifiedUser, BackendError>;
}

/// Looks up a user's tenant memberships.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    async fn memberships_for(&self, user_id: &str) -> Result<Vec<TenantMembership>, BackendError>;
}

#[derive(Clone)]
pub struct AuthBackend {
    pub identity: Arc<dyn IdentityVerifier>,
    pub memberships: Arc<dyn MembershipStore>,
}

impl AuthBackend {
    /// Supabase-backed identity and membership lookups, or `None` when the
    /// service credentials are not configured.
    pub fn from_config(config: &AppConfig) -> Result<Option<Self>, BackendError> {
        let Some(credentials) = config.supabase.as_ref() else {
            return Ok(None);
        };
        let supabase = Arc::new(SupabaseBackend::new(credentials, config.http_timeout)?);
        Ok(Some(Self {
            identity: supabase.clone(),
            memberships: supabase,
        }))
    }
}

/// Calls Supabase Auth and PostgREST with the service-role key.
#[derive(Clone)]
pub struct SupabaseBackend {
    client: reqwest::Client,
    url: String,
    service_role_key: String,
}

impl SupabaseBackend {
    pub fn new(
        credentials: &SupabaseCredentials,
        timeout: std::time::Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| BackendError::Http(sanitize(&error)))?;
        Ok(Self {
            client,
            url: credentials.url.trim_end_matches('/').to_string(),
            service_role_key: credentials.service_role_key.clone(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, BackendError> {
        let response = request
            .header("apikey", &self.service_role_key)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| BackendError::Http(sanitize(&error)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Status {
                status,
                body: compact_text(&body),
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|error| BackendError::Payload(sanitize(&error)))
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MembershipRow {
    tenant_id: String,
    role: Option<String>,
}

impl From<MembershipRow> for TenantMembership {
    fn from(row: MembershipRow) -> Self {
        Self::new(
            row.tenant_id,
            row.role.as_deref().map_or(MemberRole::Member, MemberRole::parse),
        )
    }
}

#[async_trait]
impl IdentityVerifier for SupabaseBackend {
    async fn verify_token(&self, token: &str) -> Result<VerifiedUser, BackendError> {
        let request = self
            .client
            .get(format!("{}/auth/v1/user", self.url))
            .bearer_auth(token);
        let user: SupabaseUser = self.get_json(request).await?;

        let user_id = user
            .id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| BackendError::Payload("user response did not include an id".into()))?;
        Ok(VerifiedUser { user_id })
    }
}

#[async_trait]
impl MembershipStore for SupabaseBackend {
    async fn memberships_for(&self, user_id: &str) -> Result<Vec<TenantMembership>, BackendError> {
        let request = self
            .client
            .get(format!("{}/rest/v1/tenant_members", self.url))
            .bearer_auth(&self.service_role_key)
            .query(&[
                ("select", "tenant_id,role".to_string()),
                ("user_id", format!("eq.{user_id}")),
            ]);
        let rows: Vec<MembershipRow> = self.get_json(request).await?;
        Ok(rows.into_iter().map(TenantMembership::from).collect())
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
