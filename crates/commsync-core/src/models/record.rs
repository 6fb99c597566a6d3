//! Versioned record model

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Last-modified marker carried by a record.
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DDTHH:MM:SS[.fff]` strings
/// (read as UTC), date-only `YYYY-MM-DD` strings, and Unix milliseconds.
/// Fractional milliseconds are truncated toward zero. Anything else is kept
/// verbatim and treated as unparseable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordTimestamp {
    Millis(i64),
    Text(String),
    Other(Value),
}

impl RecordTimestamp {
    /// Parse into a UTC instant, or `None` when the value is unparseable.
    pub fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(millis) => DateTime::from_timestamp_millis(*millis),
            Self::Text(text) => parse_timestamp_text(text),
            Self::Other(Value::Number(number)) => {
                number.as_f64().and_then(fractional_millis_to_utc)
            }
            Self::Other(_) => None,
        }
    }

    pub fn to_millis(&self) -> Option<i64> {
        self.parse().map(|instant| instant.timestamp_millis())
    }
}

impl From<DateTime<Utc>> for RecordTimestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Text(value.to_rfc3339())
    }
}

impl From<&str> for RecordTimestamp {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl fmt::Display for RecordTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Millis(millis) => write!(f, "{millis}"),
            Self::Text(text) => f.write_str(text),
            Self::Other(value) => write!(f, "{value}"),
        }
    }
}

/// Largest magnitude chrono accepts as milliseconds from the epoch.
const MAX_TIMESTAMP_MILLIS: f64 = 8.64e15;

#[allow(clippy::cast_possible_truncation)]
fn fractional_millis_to_utc(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() || millis.abs() > MAX_TIMESTAMP_MILLIS {
        return None;
    }
    DateTime::from_timestamp_millis(millis.trunc() as i64)
}

fn parse_timestamp_text(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Value of a single record field.
///
/// JSON arrays deserialize as [`FieldValue::List`]; everything else is a
/// [`FieldValue::Scalar`]. Whether a field merges as a set is decided by the
/// merge policy, not by this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    List(Vec<Value>),
    Scalar(Value),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Scalar(Value::String(value.into()))
    }

    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// Items this value contributes to a set union.
    ///
    /// A scalar counts as a one-element collection and `null` as empty.
    pub fn as_items(&self) -> &[Value] {
        match self {
            Self::List(items) => items,
            Self::Scalar(Value::Null) => &[],
            Self::Scalar(value) => std::slice::from_ref(value),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Value::String(text)) => Some(text),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => Self::List(items),
            other => Self::Scalar(other),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

/// A replicated entity: identifying key, optional last-modified marker, and
/// an open set of fields.
///
/// Serialized as a flat JSON object: `{ "id": ..., "updatedAt": ..., ...fields }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub id: String,
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<RecordTimestamp>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, FieldValue>,
}

impl VersionedRecord {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            updated_at: None,
            fields: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_updated_at(mut self, updated_at: impl Into<RecordTimestamp>) -> Self {
        self.updated_at = Some(updated_at.into());
        self
    }

    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Parsed last-modified instant, `None` when absent or unparseable.
    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        self.updated_at.as_ref().and_then(RecordTimestamp::parse)
    }

    /// Records must carry a non-blank `id` to be paired.
    pub fn validate(&self) -> crate::Result<()> {
        if self.id.trim().is_empty() {
            return Err(crate::Error::InvalidInput(
                "record id must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn from_json(payload: &str) -> crate::Result<Self> {
        let record: Self = serde_json::from_str(payload)?;
        record.validate()?;
        Ok(record)
    }

    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
