//! Parameter shaping helpers.
//!
//! Root-to-argument mappings address values by dot path on both sides:
//! `"author" -> "id"` copies `root.author` into `params.id`, and
//! `"id" -> "query.author"` writes into a nested `query` object, creating
//! intermediate objects as needed. Merging follows defaults semantics: the
//! target keeps what it already has, recursing into nested objects.

use serde_json::{Map, Value};

/// Reads the value at a dot path, if present.
#[must_use]
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Writes `value` at a dot path, creating intermediate objects and
/// overwriting non-object intermediates.
pub fn set_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = target;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry
            .as_object_mut()
            .expect("entry was just made an object");
    }
}

/// Fills `target` with entries from `defaults` that it does not already have,
/// recursing where both sides hold objects.
pub fn merge_defaults(target: &mut Map<String, Value>, defaults: &Map<String, Value>) {
    for (key, default) in defaults {
        match target.get_mut(key) {
            None => {
                target.insert(key.clone(), default.clone());
            }
            Some(Value::Object(existing)) => {
                if let Value::Object(default_obj) = default {
                    merge_defaults(existing, default_obj);
                }
            }
            Some(_) => {}
        }
    }
}
