//! Structural redaction over materialized JSON.
//!
//! Unlike the streaming pipeline, these helpers operate on a fully parsed
//! [`serde_json::Value`]. They back offline tooling that needs to strip or
//! probe members by name or by dotted path.

use serde_json::Value;

/// Remove every member named `member`, anywhere in the tree. Returns true
/// when at least one member was removed.
pub fn redact_all_instances_by_name(value: &mut Value, member: &str) -> bool {
    match value {
        Value::Object(map) => {
            let mut removed = map.remove(member).is_some();
            for child in map.values_mut() {
                removed |= redact_all_instances_by_name(child, member);
            }
            removed
        }
        Value::Array(items) => {
            let mut removed = false;
            for child in items {
                removed |= redact_all_instances_by_name(child, member);
            }
            removed
        }
        _ => false,
    }
}

/// Remove the member addressed by a dot-separated `path` from the root.
/// Missing intermediates leave the value untouched and return false.
pub fn redact_by_path(value: &mut Value, path: &str) -> bool {
    let mut keys = path.split('.').peekable();
    let mut current = value;
    while let Some(key) = keys.next() {
        let Value::Object(map) = current else {
            return false;
        };
        if keys.peek().is_none() {
            return map.remove(key).is_some();
        }
        match map.get_mut(key) {
            Some(child) => current = child,
            None => return false,
        }
    }
    false
}

/// True when some member named `member` exists anywhere in the tree.
pub fn search_all_instances_by_name(value: &Value, member: &str) -> bool {
    match value {
        Value::Object(map) => {
            map.contains_key(member)
                || map
                    .values()
                    .any(|child| search_all_instances_by_name(child, member))
        }
        Value::Array(items) => items
            .iter()
            .any(|child| search_all_instances_by_name(child, member)),
        _ => false,
    }
}

/// True when the dot-separated `path` resolves to a member from the root.
pub fn search_by_path(value: &Value, path: &str) -> bool {
    let mut current = value;
    for key in path.split('.') {
        let Value::Object(map) = current else {
            return false;
        };
        match map.get(key) {
            Some(child) => current = child,
            None => return false,
        }
    }
    true
}
