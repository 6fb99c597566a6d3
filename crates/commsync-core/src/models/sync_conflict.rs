//! Sync conflict model

use serde::{Deserialize, Serialize};

use crate::conflict::{ReconcileStrategy, Winner};
use crate::models::{RecordTimestamp, VersionedRecord};

/// Audit entry for a record pair whose versions diverged during reconciliation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Record involved in the conflict
    pub record_id: String,
    /// Local version's timestamp (unix ms), `None` when absent or unparseable
    pub local_updated_at: Option<i64>,
    /// Remote version's timestamp (unix ms), `None` when absent or unparseable
    pub remote_updated_at: Option<i64>,
    /// Side whose version won the last-write-wins comparison
    pub winner: Winner,
    /// Resolution timestamp (unix ms)
    pub resolved_at: i64,
    /// Resolution strategy
    pub strategy: ReconcileStrategy,
}

impl SyncConflict {
    pub fn observed(
        local: &VersionedRecord,
        remote: &VersionedRecord,
        winner: Winner,
        strategy: ReconcileStrategy,
        resolved_at: i64,
    ) -> Self {
        Self {
            record_id: local.id.clone(),
            local_updated_at: local.updated_at.as_ref().and_then(RecordTimestamp::to_millis),
            remote_updated_at: remote.updated_at.as_ref().and_then(RecordTimestamp::to_millis),
            winner,
            resolved_at,
            strategy,
        }
    }
}
