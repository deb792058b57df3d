//! Historical record helpers.
//!
//! Every committed mutation of a status-bearing entity appends an immutable
//! snapshot row. This module computes the structural diff between the prior
//! and next snapshot and turns it into a human-readable change reason. It
//! lives in `core` so the repository layer and any future tooling share it.

use serde::Serialize;
use serde_json::Value;

// ---------------------------------------------------------------------------
// History type
// ---------------------------------------------------------------------------

/// Kind of historical record, using the conventional one-character codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HistoryType {
    #[serde(rename = "+")]
    Created,
    #[serde(rename = "~")]
    Changed,
    #[serde(rename = "-")]
    Deleted,
}

impl HistoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "+",
            Self::Changed => "~",
            Self::Deleted => "-",
        }
    }
}

/// Entity type names used in `history_records.entity_type`.
pub mod entity_types {
    pub const ALLOCATION: &str = "allocation";
    pub const ALLOCATION_USER: &str = "allocation_user";
    pub const ALLOCATION_USER_ATTRIBUTE: &str = "allocation_user_attribute";
    pub const ALLOCATION_ATTRIBUTE: &str = "allocation_attribute";
    pub const CHANGE_REQUEST: &str = "allocation_change_request";
    pub const CLUSTER_ACCESS_REQUEST: &str = "cluster_access_request";
    pub const USER: &str = "user";
    pub const USER_PROFILE: &str = "user_profile";
}

// ---------------------------------------------------------------------------
// Diffing
// ---------------------------------------------------------------------------

/// Keys that change on every write and carry no audit value.
const IGNORED_KEYS: &[&str] = &["updated_at", "created_at"];

/// A single top-level field that differs between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// Compare two JSON object snapshots key by key.
///
/// With no prior snapshot every non-null field of `next` is reported as a
/// change from `null`. Keys are reported in sorted order. Non-object
/// snapshots are compared as a whole under the field name `"value"`.
pub fn diff_snapshots(prev: Option<&Value>, next: &Value) -> Vec<FieldChange> {
    let empty = serde_json::Map::new();
    let (prev_map, next_map) = match (prev, next) {
        (Some(Value::Object(p)), Value::Object(n)) => (p, n),
        (None, Value::Object(n)) => (&empty, n),
        (prev, next) => {
            let old = prev.cloned().unwrap_or(Value::Null);
            if &old == next {
                return Vec::new();
            }
            return vec![FieldChange {
                field: "value".to_string(),
                old,
                new: next.clone(),
            }];
        }
    };

    let mut keys: Vec<&String> = prev_map.keys().chain(next_map.keys()).collect();
    keys.sort();
    keys.dedup();

    keys.into_iter()
        .filter(|k| !IGNORED_KEYS.contains(&k.as_str()))
        .filter_map(|k| {
            let old = prev_map.get(k).cloned().unwrap_or(Value::Null);
            let new = next_map.get(k).cloned().unwrap_or(Value::Null);
            (old != new).then(|| FieldChange {
                field: k.clone(),
                old,
                new,
            })
        })
        .collect()
}

/// Render changes as `field: old -> new; ...` using JSON notation for values.
pub fn change_reason(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(|c| format!("{}: {} -> {}", c.field, c.old, c.new))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Pick the stored change reason: an explicit one wins, otherwise the
/// computed diff summary. Created records with no explicit reason say so.
pub fn resolve_change_reason(
    explicit: Option<&str>,
    history_type: HistoryType,
    changes: &[FieldChange],
) -> String {
    match explicit {
        Some(reason) if !reason.trim().is_empty() => reason.to_string(),
        _ => match history_type {
            HistoryType::Created => "Created.".to_string(),
            HistoryType::Deleted => "Deleted.".to_string(),
            HistoryType::Changed => change_reason(changes),
        },
    }
}

/// Change reason for a status move, e.g. `Status changed from "Processing" to "Active".`
pub fn status_change_reason(from: &str, to: &str) -> String {
    format!("Status changed from \"{from}\" to \"{to}\".")
}

// ---------------------------------------------------------------------------
// Sensitive field redaction
// ---------------------------------------------------------------------------

/// Fields that should be redacted from snapshots before storage.
pub const SENSITIVE_FIELDS: &[&str] = &["password", "token", "secret", "api_key"];

/// Redact sensitive fields from a JSON value, recursing into objects and arrays.
pub fn redact_sensitive_fields(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                let lower_key = key.to_lowercase();
                if SENSITIVE_FIELDS.iter().any(|f| lower_key.contains(f)) {
                    redacted.insert(key.clone(), Value::String("[REDACTED]".to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_fields(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_sensitive_fields).collect()),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn identical_snapshots_have_no_changes() {
        let a = json!({"id": 1, "status": "Active"});
        assert!(diff_snapshots(Some(&a), &a).is_empty());
    }

    #[test]
    fn timestamps_are_ignored() {
        let a = json!({"status": "Active", "updated_at": "2024-01-01T00:00:00Z"});
        let b = json!({"status": "Active", "updated_at": "2024-02-01T00:00:00Z"});
        assert!(diff_snapshots(Some(&a), &b).is_empty());
    }

    #[test]
    fn changed_fields_are_sorted_and_reported() {
        let a = json!({"username": null, "status": "Pending - Add"});
        let b = json!({"username": "alice", "status": "Active"});
        let changes = diff_snapshots(Some(&a), &b);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].field, "status");
        assert_eq!(changes[1].field, "username");
        assert_eq!(
            change_reason(&changes),
            "status: \"Pending - Add\" -> \"Active\"; username: null -> \"alice\""
        );
    }

    #[test]
    fn creation_reports_non_null_fields() {
        let b = json!({"id": 3, "note": null});
        let changes = diff_snapshots(None, &b);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "id");
    }

    #[test]
    fn removed_key_is_a_change_to_null() {
        let a = json!({"value": "Active"});
        let b = json!({});
        let changes = diff_snapshots(Some(&a), &b);
        assert_eq!(changes[0].new, Value::Null);
    }

    #[test]
    fn explicit_reason_wins() {
        let changes = vec![FieldChange {
            field: "status".into(),
            old: json!("New"),
            new: json!("Active"),
        }];
        assert_eq!(
            resolve_change_reason(Some("Approved by admin."), HistoryType::Changed, &changes),
            "Approved by admin."
        );
        assert_eq!(
            resolve_change_reason(None, HistoryType::Changed, &changes),
            "status: \"New\" -> \"Active\""
        );
        assert_eq!(resolve_change_reason(Some(" "), HistoryType::Created, &[]), "Created.");
    }

    #[test]
    fn status_reason_is_quoted() {
        assert_eq!(
            status_change_reason("Processing", "Active"),
            "Status changed from \"Processing\" to \"Active\"."
        );
    }

    #[test]
    fn redacts_nested_secrets() {
        let v = json!({"user": {"password_hash": "x", "name": "a"}});
        let r = redact_sensitive_fields(&v);
        assert_eq!(r["user"]["password_hash"], "[REDACTED]");
        assert_eq!(r["user"]["name"], "a");
    }

    #[test]
    fn history_type_codes() {
        assert_eq!(HistoryType::Created.as_str(), "+");
        assert_eq!(HistoryType::Changed.as_str(), "~");
        assert_eq!(HistoryType::Deleted.as_str(), "-");
    }
}
