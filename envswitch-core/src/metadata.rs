/*!
Descriptive tool metadata and metadata-level diffing.

Adapters describe the live state of their tool with a small map of fields
(active account, current context, ...). Values are restricted to a closed set
of scalar types so that comparisons stay type-safe.
*/

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Metadata map produced by a tool adapter, keyed by field name.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single metadata field value
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(i64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Number(n) => write!(f, "{n}"),
            MetadataValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Number(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Kind of difference between a snapshot and the live state
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Present live but not in the snapshot
    Added,
    /// Present in the snapshot but not live
    Removed,
    /// Present in both with different values
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        };
        f.write_str(label)
    }
}

/// One field-level difference
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub field: String,
    pub kind: ChangeKind,
    /// Value recorded in the snapshot
    pub old: Option<MetadataValue>,
    /// Value observed live
    pub new: Option<MetadataValue>,
}

impl Change {
    pub fn added<S: Into<String>>(field: S, new: MetadataValue) -> Self {
        Self {
            field: field.into(),
            kind: ChangeKind::Added,
            old: None,
            new: Some(new),
        }
    }

    pub fn removed<S: Into<String>>(field: S, old: MetadataValue) -> Self {
        Self {
            field: field.into(),
            kind: ChangeKind::Removed,
            old: Some(old),
            new: None,
        }
    }

    pub fn modified<S: Into<String>>(field: S, old: MetadataValue, new: MetadataValue) -> Self {
        Self {
            field: field.into(),
            kind: ChangeKind::Modified,
            old: Some(old),
            new: Some(new),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old, &self.new) {
            (Some(old), Some(new)) => write!(f, "~ {}: {} -> {}", self.field, old, new),
            (None, Some(new)) => write!(f, "+ {}: {}", self.field, new),
            (Some(old), None) => write!(f, "- {}: {}", self.field, old),
            (None, None) => write!(f, "  {}", self.field),
        }
    }
}

/// Compare snapshot metadata against live metadata
///
/// Fields only in `live` are reported as added, fields only in `snapshot` as
/// removed, and fields whose values differ as modified. The result is ordered
/// by field name.
pub fn diff_metadata(snapshot: &Metadata, live: &Metadata) -> Vec<Change> {
    let mut changes = Vec::new();

    for (field, old) in snapshot {
        match live.get(field) {
            None => changes.push(Change::removed(field.clone(), old.clone())),
            Some(new) if new != old => {
                changes.push(Change::modified(field.clone(), old.clone(), new.clone()))
            }
            Some(_) => {}
        }
    }

    for (field, new) in live {
        if !snapshot.contains_key(field) {
            changes.push(Change::added(field.clone(), new.clone()));
        }
    }

    changes.sort_by(|a, b| a.field.cmp(&b.field));
    changes
}
