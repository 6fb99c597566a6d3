//! Client-side sync session configuration.
//!
//! A session runs either with a shared development token or with per-user
//! credentials exchanged through the auth webhook. `SyncEnvConfig` reads the
//! `COMMSYNC_*` environment variables and picks the mode.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::sync::Arc;

use crate::sync::{SessionError, SessionResult, TokenProvider};
use crate::util::{is_http_url, normalize_text_option};

pub const APP_ID_VAR: &str = "COMMSYNC_APP_ID";
pub const PLAYGROUND_TOKEN_VAR: &str = "COMMSYNC_PLAYGROUND_TOKEN";
pub const AUTH_URL_VAR: &str = "COMMSYNC_AUTH_URL";

#[derive(Clone, PartialEq, Eq)]
pub struct DevelopmentConfig {
    pub app_id: String,
    pub token: String,
    pub auth_url: Option<String>,
}

impl DevelopmentConfig {
    pub fn new(app_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            token: token.into(),
            auth_url: None,
        }
    }
}

impl fmt::Debug for DevelopmentConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DevelopmentConfig")
            .field("app_id", &self.app_id)
            .field("token", &"[REDACTED]")
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct AuthenticatedConfig {
    pub app_id: String,
    pub auth_url: String,
    /// Sent to the webhook as `clientId`; generated when absent.
    pub client_id: Option<String>,
    pub token_provider: Arc<dyn TokenProvider>,
}

impl AuthenticatedConfig {
    pub fn new(
        app_id: impl Into<String>,
        auth_url: impl Into<String>,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            auth_url: auth_url.into(),
            client_id: None,
            token_provider,
        }
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }
}

impl fmt::Debug for AuthenticatedConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthenticatedConfig")
            .field("app_id", &self.app_id)
            .field("auth_url", &self.auth_url)
            .field("client_id", &self.client_id)
            .field("token_provider", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SessionConfig {
    Development(DevelopmentConfig),
    Authenticated(AuthenticatedConfig),
}

impl SessionConfig {
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Development(_) => "development",
            Self::Authenticated(_) => "authenticated",
        }
    }
}

/// Sync settings read from the environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SyncEnvConfig {
    pub app_id: Option<String>,
    pub playground_token: Option<String>,
    pub auth_url: Option<String>,
}

impl fmt::Debug for SyncEnvConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncEnvConfig")
            .field("app_id", &self.app_id)
            .field(
                "playground_token",
                &self.playground_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("auth_url", &self.auth_url)
            .finish()
    }
}

impl SyncEnvConfig {
    pub fn from_env() -> Self {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            app_id: normalize_text_option(lookup(APP_ID_VAR)),
            playground_token: normalize_text_option(lookup(PLAYGROUND_TOKEN_VAR)),
            auth_url: normalize_text_option(lookup(AUTH_URL_VAR))
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// Choose the session mode.
    ///
    /// Authenticated mode needs both an auth URL and a token provider;
    /// otherwise the development token is used.
    pub fn into_session_config(
        self,
        token_provider: Option<Arc<dyn TokenProvider>>,
    ) -> SessionResult<SessionConfig> {
        let app_id = self.app_id.ok_or_else(|| {
            SessionError::InvalidConfiguration(format!("{APP_ID_VAR} is required"))
        })?;

        if let Some(auth_url) = self.auth_url.as_deref() {
            if !is_http_url(auth_url) {
                return Err(SessionError::InvalidConfiguration(format!(
                    "{AUTH_URL_VAR} must start with http:// or https://"
                )));
            }
        }

        match (self.auth_url, token_provider, self.playground_token) {
            (Some(auth_url), Some(token_provider), _) => Ok(SessionConfig::Authenticated(
                AuthenticatedConfig::new(app_id, auth_url, token_provider),
            )),
            (auth_url, _, Some(token)) => Ok(SessionConfig::Development(DevelopmentConfig {
                app_id,
                token,
                auth_url,
            })),
            (_, _, None) => Err(SessionError::InvalidConfiguration(format!(
                "{PLAYGROUND_TOKEN_VAR} is required unless {AUTH_URL_VAR} and an access token are provided"
            ))),
        }
    }
}
