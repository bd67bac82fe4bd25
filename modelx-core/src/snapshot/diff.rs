//! Structural differences between two snapshots

use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

/// One difference, addressed by JSON pointer (`/Counter/count`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotChange {
    pub path: String,
    pub kind: ChangeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
}

impl fmt::Display for SnapshotChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        match self.kind {
            ChangeKind::Added => write!(f, "+ {}", path),
            ChangeKind::Removed => write!(f, "- {}", path),
            ChangeKind::Changed => write!(f, "~ {}", path),
        }
    }
}

/// Every path at which `new` differs from `old`
///
/// Objects are compared key by key and arrays index by index; any other
/// difference (including a change of kind) is reported at the path where
/// it occurs, without descending further.
pub fn diff_snapshots(old: &Value, new: &Value) -> Vec<SnapshotChange> {
    let mut changes = Vec::new();
    diff_at(String::new(), old, new, &mut changes);
    changes
}

fn diff_at(path: String, old: &Value, new: &Value, changes: &mut Vec<SnapshotChange>) {
    match (old, new) {
        (Value::Object(before), Value::Object(after)) => {
            for (key, value) in before {
                if !after.contains_key(key) {
                    changes.push(removed(child_path(&path, key), value));
                }
            }
            for (key, value) in after {
                let child = child_path(&path, key);
                match before.get(key) {
                    Some(previous) => diff_at(child, previous, value, changes),
                    None => changes.push(added(child, value)),
                }
            }
        }
        (Value::Array(before), Value::Array(after)) => {
            for (index, value) in after.iter().enumerate() {
                let child = child_path(&path, &index.to_string());
                match before.get(index) {
                    Some(previous) => diff_at(child, previous, value, changes),
                    None => changes.push(added(child, value)),
                }
            }
            for (index, value) in before.iter().enumerate().skip(after.len()) {
                changes.push(removed(child_path(&path, &index.to_string()), value));
            }
        }
        _ if old != new => changes.push(SnapshotChange {
            path,
            kind: ChangeKind::Changed,
            old: Some(old.clone()),
            new: Some(new.clone()),
        }),
        _ => {}
    }
}

fn added(path: String, value: &Value) -> SnapshotChange {
    SnapshotChange {
        path,
        kind: ChangeKind::Added,
        old: None,
        new: Some(value.clone()),
    }
}

fn removed(path: String, value: &Value) -> SnapshotChange {
    SnapshotChange {
        path,
        kind: ChangeKind::Removed,
        old: Some(value.clone()),
        new: None,
    }
}

fn child_path(parent: &str, segment: &str) -> String {
    let escaped = segment.replace('~', "~0").replace('/', "~1");
    format!("{}/{}", parent, escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_snapshots_have_no_changes() {
        let value = json!({"a": [1, 2], "b": {"c": null}});
        assert!(diff_snapshots(&value, &value).is_empty());
    }

    #[test]
    fn test_changes_are_reported_by_pointer() {
        let old = json!({"Counter": {"count": 0, "label": "x"}, "List": {"items": [1, 2]}});
        let new = json!({"Counter": {"count": 1, "a/b": true}, "List": {"items": [1]}});

        let rendered: Vec<String> = diff_snapshots(&old, &new)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            rendered,
            vec![
                "- /Counter/label",
                "~ /Counter/count",
                "+ /Counter/a~1b",
                "- /List/items/1",
            ]
        );
    }

    #[test]
    fn test_root_kind_change() {
        let changes = diff_snapshots(&json!([1]), &json!({"a": 1}));
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Changed);
        assert_eq!(changes[0].to_string(), "~ /");
    }
}
