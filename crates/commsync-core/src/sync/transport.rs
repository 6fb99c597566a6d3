use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use super::{AuthHandler, SessionIdentity, SyncAuthError};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Sync transport failed to start: {0}")]
    Start(String),
    #[error("Sync transport failed to stop: {0}")]
    Stop(String),
    #[error("Sync transport rejected credentials: {0}")]
    Unauthenticated(#[from] SyncAuthError),
}

/// Connection to the replication engine for one session.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn start_sync(&self) -> Result<(), TransportError>;
    async fn stop_sync(&self) -> Result<(), TransportError>;
    /// Number of remote peers currently visible.
    fn remote_peer_count(&self) -> usize;
}

/// Creates a transport for each new session.
pub trait TransportFactory: Send + Sync {
    fn create(&self, identity: &SessionIdentity) -> Result<Arc<dyn SyncTransport>, TransportError>;
}

/// In-process transport. Peers are whatever the owning factory reports.
pub struct LoopbackTransport {
    app_id: String,
    auth: Option<Arc<dyn AuthHandler>>,
    peers: watch::Receiver<BTreeSet<String>>,
    running: AtomicBool,
}

impl LoopbackTransport {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncTransport for LoopbackTransport {
    async fn start_sync(&self) -> Result<(), TransportError> {
        if let Some(auth) = &self.auth {
            auth.authenticate().await?;
        }
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(app_id = %self.app_id, "Loopback sync started");
        Ok(())
    }

    async fn stop_sync(&self) -> Result<(), TransportError> {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!(app_id = %self.app_id, "Loopback sync stopped");
        Ok(())
    }

    fn remote_peer_count(&self) -> usize {
        if self.is_running() {
            self.peers.borrow().len()
        } else {
            0
        }
    }
}

/// Builds [`LoopbackTransport`]s sharing one peer graph.
pub struct LoopbackTransportFactory {
    peers: watch::Sender<BTreeSet<String>>,
}

impl Default for LoopbackTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransportFactory {
    pub fn new() -> Self {
        let (peers, _) = watch::channel(BTreeSet::new());
        Self { peers }
    }

    pub fn peer_joined(&self, peer_id: impl Into<String>) {
        let peer_id = peer_id.into();
        self.peers.send_modify(|peers| {
            peers.insert(peer_id);
        });
    }

    pub fn peer_left(&self, peer_id: &str) {
        self.peers.send_modify(|peers| {
            peers.remove(peer_id);
        });
    }

    pub fn peers(&self) -> BTreeSet<String> {
        self.peers.borrow().clone()
    }
}

impl TransportFactory for LoopbackTransportFactory {
    fn create(&self, identity: &SessionIdentity) -> Result<Arc<dyn SyncTransport>, TransportError> {
        let auth = match identity {
            SessionIdentity::Development { .. } => None,
            SessionIdentity::Authenticated { authenticator, .. } => {
                Some(Arc::clone(authenticator) as Arc<dyn AuthHandler>)
            }
        };
        Ok(Arc::new(LoopbackTransport {
            app_id: identity.app_id().to_string(),
            auth,
            peers: self.peers.subscribe(),
            running: AtomicBool::new(false),
        }))
    }
}
