//! Loader identity and batch keys.
//!
//! Loaders are cached per request under a key derived from the action name
//! and a structural hash of the call-time arguments merged with static
//! params. The hash is order-independent over object keys, so equivalent
//! argument sets collapse to the same loader across separate field
//! invocations within one request.

use std::hash::{DefaultHasher, Hash, Hasher};

use serde_json::{Map, Value};

use crate::params::merge_defaults;

/// A batching key wrapping an arbitrary JSON value.
///
/// Equality is structural; hashing walks the value with object keys sorted,
/// so two structurally equal values always share a hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchKey(pub Value);

impl Hash for BatchKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_json(&self.0, state);
    }
}

fn hash_json<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => state.write_u8(0),
        Value::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Value::Number(n) => {
            state.write_u8(2);
            if let Some(i) = n.as_i64() {
                i.hash(state);
            } else if let Some(u) = n.as_u64() {
                u.hash(state);
            } else if let Some(f) = n.as_f64() {
                f.to_bits().hash(state);
            }
        }
        Value::String(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Value::Array(items) => {
            state.write_u8(4);
            state.write_usize(items.len());
            for item in items {
                hash_json(item, state);
            }
        }
        Value::Object(map) => {
            state.write_u8(5);
            state.write_usize(map.len());
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            for (key, item) in entries {
                key.hash(state);
                hash_json(item, state);
            }
        }
    }
}

/// Stable structural hash of a JSON value.
#[must_use]
pub fn stable_hash(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_json(value, &mut hasher);
    hasher.finish()
}

/// Computes the per-call-site loader identity.
///
/// With nothing to disambiguate by, every resolution of the action shares one
/// loader; otherwise the identity covers the merged argument set.
#[must_use]
pub fn loader_key(action: &str, static_params: &Map<String, Value>, args: &Map<String, Value>) -> String {
    if static_params.is_empty() && args.is_empty() {
        return action.to_string();
    }
    let mut merged = args.clone();
    merge_defaults(&mut merged, static_params);
    format!("{action}:{:016x}", stable_hash(&Value::Object(merged)))
}
