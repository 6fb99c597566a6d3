//! Shared sync state types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Connectivity of the process-wide sync session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Session active and at least one remote peer is visible.
    Online,
    /// Session active with no reachable remote peers.
    Offline,
    /// No session has been created (or it was stopped).
    Disconnected,
}

impl SyncStatus {
    pub const fn from_peer_count(peer_count: usize) -> Self {
        if peer_count > 0 {
            Self::Online
        } else {
            Self::Offline
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
