//! Batch reconciliation of local and remote record sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::merge::{merge_records, union_items, MergePolicy};
use super::{pick_winner, Versioned, Winner};
use crate::models::{FieldValue, SyncConflict, VersionedRecord};
use crate::util::unix_timestamp_millis_now;

/// How a diverged pair is collapsed into one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconcileStrategy {
    /// Whole-record last-write-wins; multi-valued fields still union.
    #[default]
    #[serde(rename = "lww")]
    LastWriteWins,
    /// Per-field merge, remote scalars override.
    #[serde(rename = "field_merge")]
    FieldMerge,
}

impl ReconcileStrategy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LastWriteWins => "lww",
            Self::FieldMerge => "field_merge",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub record: VersionedRecord,
    pub winner: Winner,
    /// Present when the two versions differed.
    pub conflict: Option<SyncConflict>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Reconciled records sorted by id.
    pub records: Vec<VersionedRecord>,
    pub conflicts: Vec<SyncConflict>,
}

/// Collapse two versions of one record.
///
/// Callers are responsible for pairing by id; the pair is not checked.
pub fn reconcile_pair(
    local: &VersionedRecord,
    remote: &VersionedRecord,
    strategy: ReconcileStrategy,
    policy: &MergePolicy,
) -> Reconciled {
    let winner = pick_winner(local.last_modified(), remote.last_modified());

    let record = match strategy {
        ReconcileStrategy::LastWriteWins => {
            let (winning, losing) = match winner {
                Winner::Local => (local, remote),
                Winner::Remote => (remote, local),
            };
            let mut record = winning.clone();
            for field in policy.multi_valued_fields() {
                let winning_value = winning.fields.get(field);
                let losing_value = losing.fields.get(field);
                if winning_value.is_none() && losing_value.is_none() {
                    continue;
                }
                record.fields.insert(
                    field.to_string(),
                    FieldValue::List(union_items(winning_value, losing_value)),
                );
            }
            record
        }
        ReconcileStrategy::FieldMerge => merge_records(local, remote, policy),
    };

    let conflict = (local != remote).then(|| {
        SyncConflict::observed(local, remote, winner, strategy, unix_timestamp_millis_now())
    });

    Reconciled {
        record,
        winner,
        conflict,
    }
}

/// Pair local and remote records by id and reconcile each pair.
///
/// Records present on one side only pass through unchanged. Duplicate ids
/// within one side keep the last occurrence.
pub fn reconcile_batch<L, R>(
    local: L,
    remote: R,
    strategy: ReconcileStrategy,
    policy: &MergePolicy,
) -> ReconcileOutcome
where
    L: IntoIterator<Item = VersionedRecord>,
    R: IntoIterator<Item = VersionedRecord>,
{
    let local = index_by_id(local, "local");
    let mut remote = index_by_id(remote, "remote");

    let mut outcome = ReconcileOutcome::default();
    for (id, local_record) in local {
        match remote.remove(&id) {
            Some(remote_record) => {
                let reconciled = reconcile_pair(&local_record, &remote_record, strategy, policy);
                if let Some(conflict) = reconciled.conflict {
                    tracing::debug!(
                        record_id = %conflict.record_id,
                        winner = conflict.winner.as_str(),
                        strategy = strategy.as_str(),
                        "Resolved diverged record"
                    );
                    outcome.conflicts.push(conflict);
                }
                outcome.records.push(reconciled.record);
            }
            None => outcome.records.push(local_record),
        }
    }
    outcome.records.extend(remote.into_values());
    outcome.records.sort_by(|left, right| left.id.cmp(&right.id));
    outcome
}

fn index_by_id<I>(records: I, side: &str) -> BTreeMap<String, VersionedRecord>
where
    I: IntoIterator<Item = VersionedRecord>,
{
    let mut indexed = BTreeMap::new();
    for record in records {
        if let Some(previous) = indexed.insert(record.id.clone(), record) {
            tracing::warn!(
                side,
                record_id = %previous.id,
                "Duplicate record id in batch; keeping the last occurrence"
            );
        }
    }
    indexed
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn member(id: &str, updated_at: &str) -> VersionedRecord {
        VersionedRecord::new(id).with_updated_at(updated_at)
    }

    #[test]
    fn lww_keeps_winner_scalars_and_unions_skills() {
        let local = member("m", "2026-01-02T10:00:00Z")
            .with_field("headline", "Local")
            .with_field("skills", FieldValue::list(["React"]));
        let remote = member("m", "2026-01-01T10:00:00Z")
            .with_field("headline", "Remote")
            .with_field("skills", FieldValue::list(["Rust"]));

        let reconciled = reconcile_pair(
            &local,
            &remote,
            ReconcileStrategy::LastWriteWins,
            &MergePolicy::default(),
        );

        assert_eq!(reconciled.winner, Winner::Local);
        assert_eq!(
            reconciled.record.get("headline"),
            Some(&FieldValue::text("Local"))
        );
        assert_eq!(
            reconciled.record.get("skills"),
            Some(&FieldValue::list(["React", "Rust"]))
        );
        assert_eq!(reconciled.record.updated_at, local.updated_at);
    }

    #[test]
    fn field_merge_reports_resolver_winner() {
        let local = member("m", "2026-01-02T10:00:00Z").with_field("bio", "Local");
        let remote = member("m", "2026-01-01T10:00:00Z").with_field("city", "Oslo");

        let reconciled = reconcile_pair(
            &local,
            &remote,
            ReconcileStrategy::FieldMerge,
            &MergePolicy::default(),
        );

        assert_eq!(reconciled.winner, Winner::Local);
        assert_eq!(reconciled.record.get("bio"), Some(&FieldValue::text("Local")));
        assert_eq!(reconciled.record.get("city"), Some(&FieldValue::text("Oslo")));
    }

    #[test]
    fn identical_versions_produce_no_conflict() {
        let record = member("m", "2026-01-01T10:00:00Z").with_field("bio", "Same");
        let reconciled = reconcile_pair(
            &record,
            &record.clone(),
            ReconcileStrategy::LastWriteWins,
            &MergePolicy::default(),
        );
        assert!(reconciled.conflict.is_none());
        assert_eq!(reconciled.record, record);
    }

    #[test]
    fn conflict_records_both_timestamps() {
        let local = member("m", "2026-01-01T10:00:00Z").with_field("bio", "A");
        let remote = VersionedRecord::new("m").with_field("bio", "B");

        let conflict = reconcile_pair(
            &local,
            &remote,
            ReconcileStrategy::LastWriteWins,
            &MergePolicy::default(),
        )
        .conflict
        .unwrap();

        assert_eq!(conflict.record_id, "m");
        assert_eq!(conflict.local_updated_at, Some(1_767_261_600_000));
        assert_eq!(conflict.remote_updated_at, None);
        assert_eq!(conflict.winner, Winner::Remote);
        assert_eq!(conflict.strategy, ReconcileStrategy::LastWriteWins);
    }

    #[test]
    fn batch_pairs_by_id_and_passes_through_singletons() {
        let local = vec![
            member("a", "2026-01-02T00:00:00Z").with_field("v", "local-a"),
            member("b", "2026-01-01T00:00:00Z").with_field("v", "local-only"),
        ];
        let remote = vec![
            member("c", "2026-01-01T00:00:00Z").with_field("v", "remote-only"),
            member("a", "2026-01-01T00:00:00Z").with_field("v", "remote-a"),
        ];

        let outcome = reconcile_batch(
            local,
            remote,
            ReconcileStrategy::LastWriteWins,
            &MergePolicy::default(),
        );

        let ids: Vec<&str> = outcome.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(
            outcome.records[0].get("v"),
            Some(&FieldValue::text("local-a"))
        );
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].record_id, "a");
    }

    #[test]
    fn batch_keeps_last_duplicate() {
        let local = vec![
            member("a", "2026-01-01T00:00:00Z").with_field("v", "first"),
            member("a", "2026-01-01T00:00:00Z").with_field("v", "second"),
        ];

        let outcome = reconcile_batch(
            local,
            Vec::new(),
            ReconcileStrategy::LastWriteWins,
            &MergePolicy::default(),
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].get("v"), Some(&FieldValue::text("second")));
    }

    #[test]
    fn strategy_serializes_short_names() {
        assert_eq!(
            serde_json::to_string(&ReconcileStrategy::LastWriteWins).unwrap(),
            "\"lww\""
        );
        assert_eq!(ReconcileStrategy::FieldMerge.as_str(), "field_merge");
    }
}
