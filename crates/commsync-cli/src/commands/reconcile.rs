use std::fs;
use std::path::Path;

use commsync_core::conflict::ReconcileOutcome;
use commsync_core::{reconcile_batch, ReconcileStrategy, VersionedRecord};
use serde::Serialize;

use crate::commands::common::{
    ensure_single_stdin, format_sync_conflict_lines, merge_policy, read_records,
    sync_conflict_to_item, SyncConflictItem,
};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct ReconcileReport<'a> {
    strategy: &'static str,
    records: &'a [VersionedRecord],
    conflicts: Vec<SyncConflictItem>,
}

pub fn reconcile_files(
    local: &Path,
    remote: &Path,
    strategy: ReconcileStrategy,
    list_fields: &[String],
) -> Result<ReconcileOutcome, CliError> {
    ensure_single_stdin(&[local, remote])?;
    let local = read_records(local)?;
    let remote = read_records(remote)?;
    Ok(reconcile_batch(
        local,
        remote,
        strategy,
        &merge_policy(list_fields, false),
    ))
}

pub fn run_reconcile(
    local: &Path,
    remote: &Path,
    strategy: ReconcileStrategy,
    list_fields: &[String],
    output: Option<&Path>,
    as_json: bool,
) -> Result<(), CliError> {
    let outcome = reconcile_files(local, remote, strategy, list_fields)?;

    if let Some(output) = output {
        fs::write(output, serde_json::to_string_pretty(&outcome.records)?)?;
        println!(
            "Wrote {} records to {}",
            outcome.records.len(),
            output.display()
        );
    }

    if as_json {
        let report = ReconcileReport {
            strategy: strategy.as_str(),
            records: if output.is_some() {
                &[]
            } else {
                &outcome.records
            },
            conflicts: outcome.conflicts.iter().map(sync_conflict_to_item).collect(),
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if output.is_none() {
        println!("{}", serde_json::to_string_pretty(&outcome.records)?);
    }
    if outcome.conflicts.is_empty() {
        println!("No conflicts.");
    } else {
        for line in format_sync_conflict_lines(&outcome.conflicts) {
            println!("{line}");
        }
    }
    Ok(())
}
