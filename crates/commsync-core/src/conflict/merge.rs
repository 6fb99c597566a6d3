//! Field-level merge of two record versions.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::models::{FieldValue, VersionedRecord};

const DEFAULT_MULTI_VALUED_FIELDS: [&str; 1] = ["skills"];

/// Which fields merge as a set union instead of a remote-wins override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergePolicy {
    multi_valued: BTreeSet<String>,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MULTI_VALUED_FIELDS)
    }
}

impl MergePolicy {
    pub fn new<I, S>(multi_valued: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            multi_valued: multi_valued.into_iter().map(Into::into).collect(),
        }
    }

    /// Every field merges with the scalar rule.
    pub fn scalar_only() -> Self {
        Self {
            multi_valued: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn with_multi_valued(mut self, field: impl Into<String>) -> Self {
        self.multi_valued.insert(field.into());
        self
    }

    pub fn is_multi_valued(&self, field: &str) -> bool {
        self.multi_valued.contains(field)
    }

    pub fn multi_valued_fields(&self) -> impl Iterator<Item = &str> {
        self.multi_valued.iter().map(String::as_str)
    }
}

/// Merge two versions of a member record with the default policy
/// (`skills` is the only multi-valued field).
pub fn merge_member_data(local: &VersionedRecord, remote: &VersionedRecord) -> VersionedRecord {
    merge_records(local, remote, &MergePolicy::default())
}

/// Merge two versions field by field.
///
/// Multi-valued fields become the deduplicated union of both sides (absent
/// counts as empty). Every other field takes remote's value when remote has
/// it, local's otherwise. `id` and `updatedAt` follow the scalar rule.
pub fn merge_records(
    local: &VersionedRecord,
    remote: &VersionedRecord,
    policy: &MergePolicy,
) -> VersionedRecord {
    let keys: BTreeSet<&String> = local.fields.keys().chain(remote.fields.keys()).collect();

    let mut fields = BTreeMap::new();
    for key in keys {
        let local_value = local.fields.get(key);
        let remote_value = remote.fields.get(key);

        let merged = if policy.is_multi_valued(key) {
            FieldValue::List(union_items(local_value, remote_value))
        } else {
            match remote_value.or(local_value) {
                Some(value) => value.clone(),
                None => continue,
            }
        };
        fields.insert(key.clone(), merged);
    }

    VersionedRecord {
        id: remote.id.clone(),
        updated_at: remote
            .updated_at
            .clone()
            .or_else(|| local.updated_at.clone()),
        fields,
    }
}

/// Deduplicated union, `first`'s items before `second`'s new ones.
pub(crate) fn union_items(first: Option<&FieldValue>, second: Option<&FieldValue>) -> Vec<Value> {
    let mut merged: Vec<Value> = Vec::new();
    for item in first
        .into_iter()
        .chain(second)
        .flat_map(FieldValue::as_items)
    {
        if !merged.contains(item) {
            merged.push(item.clone());
        }
    }
    merged
}
