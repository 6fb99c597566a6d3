use std::fs;
use std::io::{self, Read};
use std::path::Path;

use commsync_core::{MergePolicy, SyncConflict, VersionedRecord};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct SyncConflictItem {
    pub record_id: String,
    pub winner: &'static str,
    pub strategy: &'static str,
    pub local_updated_at: Option<i64>,
    pub remote_updated_at: Option<i64>,
    pub resolved_at: i64,
    pub resolved_at_iso: String,
}

pub fn sync_conflict_to_item(conflict: &SyncConflict) -> SyncConflictItem {
    SyncConflictItem {
        record_id: conflict.record_id.clone(),
        winner: conflict.winner.as_str(),
        strategy: conflict.strategy.as_str(),
        local_updated_at: conflict.local_updated_at,
        remote_updated_at: conflict.remote_updated_at,
        resolved_at: conflict.resolved_at,
        resolved_at_iso: format_sync_timestamp(conflict.resolved_at),
    }
}

pub fn format_sync_conflict_lines(conflicts: &[SyncConflict]) -> Vec<String> {
    conflicts
        .iter()
        .map(|conflict| {
            format!(
                "{}  {:<11}  record={}  winner={}  local={} remote={}",
                format_sync_timestamp(conflict.resolved_at),
                conflict.strategy.as_str(),
                conflict.record_id,
                conflict.winner.as_str(),
                format_marker(conflict.local_updated_at),
                format_marker(conflict.remote_updated_at)
            )
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

/// Render an optional `updatedAt` marker; records without one show `-`.
pub fn format_marker(timestamp_ms: Option<i64>) -> String {
    timestamp_ms.map_or_else(|| "-".to_string(), format_sync_timestamp)
}

/// Policy for `--list-field` / `--scalar-only`; no flags keeps the default.
pub fn merge_policy(list_fields: &[String], scalar_only: bool) -> MergePolicy {
    if scalar_only {
        MergePolicy::scalar_only()
    } else if list_fields.is_empty() {
        MergePolicy::default()
    } else {
        MergePolicy::new(list_fields.iter().map(|field| field.trim()))
    }
}

pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

pub fn ensure_single_stdin(paths: &[&Path]) -> Result<(), CliError> {
    if paths.iter().filter(|path| is_stdin(path)).count() > 1 {
        return Err(CliError::StdinReused);
    }
    Ok(())
}

pub fn read_input(path: &Path) -> Result<String, CliError> {
    if is_stdin(path) {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(fs::read_to_string(path)?)
}

pub fn read_record(path: &Path) -> Result<VersionedRecord, CliError> {
    let payload = read_input(path)?;
    VersionedRecord::from_json(&payload).map_err(|error| invalid_record_file(path, &error))
}

/// Read a JSON array of records, or a single record object.
pub fn read_records(path: &Path) -> Result<Vec<VersionedRecord>, CliError> {
    let payload = read_input(path)?;
    let value: Value =
        serde_json::from_str(&payload).map_err(|error| invalid_record_file(path, &error))?;

    let records = if value.is_array() {
        serde_json::from_value::<Vec<VersionedRecord>>(value)
    } else {
        serde_json::from_value::<VersionedRecord>(value).map(|record| vec![record])
    };
    let records = records.map_err(|error| invalid_record_file(path, &error))?;
    for record in &records {
        record
            .validate()
            .map_err(|error| invalid_record_file(path, &error))?;
    }
    Ok(records)
}

fn invalid_record_file(path: &Path, error: &impl std::fmt::Display) -> CliError {
    CliError::InvalidRecordFile {
        path: path.display().to_string(),
        message: error.to_string(),
    }
}
