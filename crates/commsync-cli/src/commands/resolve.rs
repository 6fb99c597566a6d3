use std::path::Path;

use commsync_core::{resolve_conflict, VersionedRecord, Winner};

use crate::commands::common::{ensure_single_stdin, format_marker, read_record};
use crate::error::CliError;

pub fn resolve_files(local: &Path, remote: &Path) -> Result<(Winner, VersionedRecord), CliError> {
    ensure_single_stdin(&[local, remote])?;
    let local = read_record(local)?;
    let remote = read_record(remote)?;

    let winning = resolve_conflict(&local, &remote);
    let winner = if std::ptr::eq(winning, &local) {
        Winner::Local
    } else {
        Winner::Remote
    };
    Ok((winner, winning.clone()))
}

pub fn run_resolve(local: &Path, remote: &Path, as_json: bool) -> Result<(), CliError> {
    let (winner, record) = resolve_files(local, remote)?;

    if !as_json {
        println!(
            "winner={}  record={}  updatedAt={}",
            winner.as_str(),
            record.id,
            format_marker(
                record
                    .updated_at
                    .as_ref()
                    .and_then(commsync_core::RecordTimestamp::to_millis)
            )
        );
    }
    println!("{}", record.to_json_pretty()?);
    Ok(())
}
