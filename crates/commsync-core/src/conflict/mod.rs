//! Conflict resolution for replicated records.
//!
//! Two versions of the same entity are reconciled with last-write-wins on the
//! record's `updatedAt` marker. Ties, missing markers, and unparseable markers
//! all resolve to the remote side so every replica picks the same winner
//! without further coordination.
//!
//! Pairwise last-write-wins only converges across more than two replicas when
//! every replica applies merges in the same order.

mod merge;
mod reconcile;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::VersionedRecord;

pub use merge::{merge_member_data, merge_records, MergePolicy};
pub use reconcile::{
    reconcile_batch, reconcile_pair, ReconcileOutcome, ReconcileStrategy, Reconciled,
};

/// Side that won a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    Local,
    Remote,
}

impl Winner {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

/// Anything carrying a last-modified instant.
pub trait Versioned {
    /// Parsed last-modified instant, `None` when absent or unparseable.
    fn last_modified(&self) -> Option<DateTime<Utc>>;
}

impl Versioned for VersionedRecord {
    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at_utc()
    }
}

/// Local wins only when both instants are known and local is strictly later.
pub fn pick_winner(local: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> Winner {
    match (local, remote) {
        (Some(local), Some(remote)) if local > remote => Winner::Local,
        _ => Winner::Remote,
    }
}

/// Return whichever of `local` and `remote` wins, unchanged.
pub fn resolve_conflict<'a, T>(local: &'a T, remote: &'a T) -> &'a T
where
    T: Versioned + ?Sized,
{
    match pick_winner(local.last_modified(), remote.last_modified()) {
        Winner::Local => local,
        Winner::Remote => remote,
    }
}
