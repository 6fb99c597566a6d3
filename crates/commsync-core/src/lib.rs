//! commsync-core - Core library for commsync
//!
//! This crate contains the record model, the conflict-resolution and merge
//! policy, tenant permission grants, and the sync session lifecycle shared by
//! the auth webhook and the command-line tool.

pub mod auth;
pub mod config;
pub mod conflict;
pub mod error;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use auth::{MemberRole, PermissionGrant, Permissions, TenantMembership};
pub use config::{AuthenticatedConfig, DevelopmentConfig, SessionConfig, SyncEnvConfig};
pub use conflict::{
    merge_member_data, merge_records, reconcile_batch, reconcile_pair, resolve_conflict,
    MergePolicy, ReconcileStrategy, Winner,
};
pub use error::{Error, Result};
pub use models::{FieldValue, RecordTimestamp, SyncConflict, VersionedRecord};
pub use state::SyncStatus;
pub use sync::{SyncSession, SyncSessionManager, WebhookAuthClient};
