use std::path::Path;

use commsync_core::{merge_records, VersionedRecord};

use crate::commands::common::{ensure_single_stdin, merge_policy, read_record};
use crate::error::CliError;

pub fn merge_files(
    local: &Path,
    remote: &Path,
    list_fields: &[String],
    scalar_only: bool,
) -> Result<VersionedRecord, CliError> {
    ensure_single_stdin(&[local, remote])?;
    let local = read_record(local)?;
    let remote = read_record(remote)?;
    Ok(merge_records(
        &local,
        &remote,
        &merge_policy(list_fields, scalar_only),
    ))
}

pub fn run_merge(
    local: &Path,
    remote: &Path,
    list_fields: &[String],
    scalar_only: bool,
) -> Result<(), CliError> {
    let merged = merge_files(local, remote, list_fields, scalar_only)?;
    println!("{}", merged.to_json_pretty()?);
    Ok(())
}
