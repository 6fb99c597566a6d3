//! Process-wide sync session owned by [`SyncSessionManager`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    AuthHandler, SyncAuthError, SyncTransport, TransportError, TransportFactory,
    WebhookAuthClient, WebhookAuthenticator,
};
use crate::config::SessionConfig;
use crate::state::SyncStatus;
use crate::util::normalize_text_option;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid session configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Sync session has been stopped")]
    Stopped,
    #[error(transparent)]
    Auth(#[from] SyncAuthError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// How a session identifies itself to the replication engine.
pub enum SessionIdentity {
    /// Shared development token; no per-user authentication.
    Development { app_id: String, token: String },
    /// Per-user credentials obtained through the auth webhook.
    Authenticated {
        app_id: String,
        authenticator: Arc<WebhookAuthenticator>,
    },
}

impl SessionIdentity {
    pub fn from_config(config: SessionConfig) -> SessionResult<Self> {
        match config {
            SessionConfig::Development(config) => Ok(Self::Development {
                app_id: required(config.app_id, "app id")?,
                token: required(config.token, "development token")?,
            }),
            SessionConfig::Authenticated(config) => {
                let app_id = required(config.app_id, "app id")?;
                let client = WebhookAuthClient::new(config.auth_url)?;
                let client_id = normalize_text_option(config.client_id)
                    .unwrap_or_else(|| format!("commsync-{}", Uuid::now_v7()));
                Ok(Self::Authenticated {
                    app_id,
                    authenticator: Arc::new(WebhookAuthenticator::new(
                        client,
                        client_id,
                        config.token_provider,
                    )),
                })
            }
        }
    }

    pub fn app_id(&self) -> &str {
        match self {
            Self::Development { app_id, .. } | Self::Authenticated { app_id, .. } => app_id,
        }
    }

    pub const fn mode(&self) -> &'static str {
        match self {
            Self::Development { .. } => "development",
            Self::Authenticated { .. } => "authenticated",
        }
    }

    pub const fn authenticator(&self) -> Option<&Arc<WebhookAuthenticator>> {
        match self {
            Self::Development { .. } => None,
            Self::Authenticated { authenticator, .. } => Some(authenticator),
        }
    }
}

impl fmt::Debug for SessionIdentity {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development { app_id, .. } => formatter
                .debug_struct("Development")
                .field("app_id", app_id)
                .field("token", &"[REDACTED]")
                .finish(),
            Self::Authenticated {
                app_id,
                authenticator,
            } => formatter
                .debug_struct("Authenticated")
                .field("app_id", app_id)
                .field("authenticator", authenticator)
                .finish(),
        }
    }
}

fn required(value: String, label: &str) -> SessionResult<String> {
    normalize_text_option(Some(value))
        .ok_or_else(|| SessionError::InvalidConfiguration(format!("{label} must not be empty")))
}

pub struct SyncSession {
    id: Uuid,
    identity: SessionIdentity,
    transport: Arc<dyn SyncTransport>,
    active: AtomicBool,
    syncing: AtomicBool,
    /// Held for the whole of every transport start or stop.
    lifecycle: Mutex<()>,
}

impl SyncSession {
    fn new(identity: SessionIdentity, transport: Arc<dyn SyncTransport>) -> Self {
        Self {
            id: Uuid::now_v7(),
            identity,
            transport,
            active: AtomicBool::new(true),
            syncing: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
        }
    }

    pub const fn id(&self) -> Uuid {
        self.id
    }

    pub const fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// False once the session has been stopped.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// True while the transport is started.
    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> SyncStatus {
        if self.is_active() {
            SyncStatus::from_peer_count(self.transport.remote_peer_count())
        } else {
            SyncStatus::Disconnected
        }
    }

    /// True when an authenticated session's grant is missing or lapses
    /// within `window`. Development sessions never expire.
    pub async fn expiring_soon(&self, window: Duration) -> bool {
        match self.identity.authenticator() {
            Some(authenticator) => authenticator.expires_within(window).await,
            None => false,
        }
    }

    /// Retry a failed start, or refresh credentials on a running session.
    ///
    /// Serialized with [`SyncSessionManager::stop_session`]: a stop issued
    /// while this is in flight waits for it and then stops the transport.
    pub async fn reauthenticate(&self) -> SessionResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.is_active() {
            return Err(SessionError::Stopped);
        }

        if self.is_syncing() {
            if let Some(authenticator) = self.identity.authenticator() {
                authenticator.authenticate().await?;
            }
            return Ok(());
        }

        self.transport.start_sync().await?;
        self.syncing.store(true, Ordering::SeqCst);
        tracing::info!(session_id = %self.id, "Sync started after re-authentication");
        Ok(())
    }

    async fn start(&self) {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.is_active() {
            return;
        }
        match self.transport.start_sync().await {
            Ok(()) => {
                self.syncing.store(true, Ordering::SeqCst);
                tracing::info!(
                    session_id = %self.id,
                    mode = self.identity.mode(),
                    "Sync started"
                );
            }
            Err(error) => {
                tracing::error!(
                    session_id = %self.id,
                    mode = self.identity.mode(),
                    "Failed to start sync: {}",
                    error
                );
            }
        }
    }

    async fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        let _lifecycle = self.lifecycle.lock().await;
        if !self.syncing.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(error) = self.transport.stop_sync().await {
            tracing::warn!(session_id = %self.id, "Failed to stop sync cleanly: {}", error);
        }
    }
}

impl fmt::Debug for SyncSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSession")
            .field("id", &self.id)
            .field("identity", &self.identity)
            .field("active", &self.is_active())
            .field("syncing", &self.is_syncing())
            .finish_non_exhaustive()
    }
}

/// Owns at most one live [`SyncSession`].
///
/// The slot lock is held for the whole of `init_session` and `stop_session`,
/// so concurrent initializations observe the first session and a stop issued
/// during an initialization tears down the session it produced.
pub struct SyncSessionManager {
    factory: Arc<dyn TransportFactory>,
    slot: Mutex<Option<Arc<SyncSession>>>,
}

impl SyncSessionManager {
    pub fn new(factory: Arc<dyn TransportFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
        }
    }

    /// Return the live session, creating and starting one if needed.
    ///
    /// Start-up failures are logged, not returned; the session then reports
    /// `Offline` until a later init or [`SyncSession::reauthenticate`] succeeds.
    pub async fn init_session(&self, config: SessionConfig) -> SessionResult<Arc<SyncSession>> {
        let mut slot = self.slot.lock().await;

        if let Some(existing) = slot.as_ref() {
            if !existing.is_syncing() {
                existing.start().await;
            }
            return Ok(Arc::clone(existing));
        }

        let identity = SessionIdentity::from_config(config)?;
        let transport = self.factory.create(&identity)?;
        let session = Arc::new(SyncSession::new(identity, transport));
        tracing::info!(
            session_id = %session.id,
            app_id = %session.identity.app_id(),
            mode = session.identity.mode(),
            "Initializing sync session"
        );

        session.start().await;
        *slot = Some(Arc::clone(&session));
        Ok(session)
    }

    /// Stop and discard the live session, if any.
    pub async fn stop_session(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(session) = slot.take() {
            session.stop().await;
            tracing::info!(session_id = %session.id, "Sync session stopped");
        }
    }

    pub async fn current_session(&self) -> Option<Arc<SyncSession>> {
        self.slot.lock().await.clone()
    }

    pub async fn sync_status(&self) -> SyncStatus {
        self.slot
            .lock()
            .await
            .as_ref()
            .map_or(SyncStatus::Disconnected, |session| session.status())
    }
}

impl fmt::Debug for SyncSessionManager {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSessionManager")
            .finish_non_exhaustive()
    }
}
