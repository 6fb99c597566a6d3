//! Data models for commsync

mod record;
mod sync_conflict;

pub use record::{FieldValue, RecordTimestamp, VersionedRecord};
pub use sync_conflict::SyncConflict;
