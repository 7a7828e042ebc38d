//! Conversions between JSON values and GraphQL execution values.
//!
//! Remote actions speak JSON; the execution engine speaks
//! `async_graphql::Value`. Abstract-type attribution follows the `__typename`
//! convention: an object carrying one is tagged with that concrete type so
//! union and interface fields resolve.

use async_graphql::dynamic::FieldValue;
use async_graphql::{Name, Value as GqlValue};
use serde_json::Value as JsonValue;

/// Converts a JSON value to a GraphQL value.
#[must_use]
pub fn json_to_gql(json: JsonValue) -> GqlValue {
    match json {
        JsonValue::Null => GqlValue::Null,
        JsonValue::Bool(b) => GqlValue::Boolean(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                GqlValue::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                GqlValue::Number(u.into())
            } else if let Some(f) = n.as_f64() {
                GqlValue::Number(
                    async_graphql::Number::from_f64(f)
                        .unwrap_or_else(|| async_graphql::Number::from(0)),
                )
            } else {
                GqlValue::Null
            }
        }
        JsonValue::String(s) => GqlValue::String(s),
        JsonValue::Array(arr) => GqlValue::List(arr.into_iter().map(json_to_gql).collect()),
        JsonValue::Object(obj) => GqlValue::Object(
            obj.into_iter()
                .map(|(k, v)| (Name::new(k), json_to_gql(v)))
                .collect(),
        ),
    }
}

/// Converts a GraphQL value to a JSON value.
#[must_use]
pub fn gql_to_json(value: &GqlValue) -> JsonValue {
    match value {
        GqlValue::Null => JsonValue::Null,
        GqlValue::Boolean(b) => JsonValue::Bool(*b),
        GqlValue::Number(n) => JsonValue::Number(n.clone()),
        GqlValue::String(s) => JsonValue::String(s.clone()),
        GqlValue::Enum(name) => JsonValue::String(name.to_string()),
        GqlValue::List(items) => JsonValue::Array(items.iter().map(gql_to_json).collect()),
        GqlValue::Object(obj) => JsonValue::Object(
            obj.iter()
                .map(|(k, v)| (k.to_string(), gql_to_json(v)))
                .collect(),
        ),
        GqlValue::Binary(_) => JsonValue::Null,
    }
}

/// Converts a GraphQL value into a resolved field value.
///
/// Null becomes `None`; lists keep their positions; objects carrying a
/// `__typename` string are attributed to that concrete type.
#[must_use]
pub fn gql_to_field_value(value: GqlValue) -> Option<FieldValue<'static>> {
    match value {
        GqlValue::Null => None,
        GqlValue::List(items) => Some(FieldValue::list(
            items
                .into_iter()
                .map(|item| gql_to_field_value(item).unwrap_or(FieldValue::NULL)),
        )),
        GqlValue::Object(obj) => {
            let type_name = obj.get("__typename").and_then(|v| match v {
                GqlValue::String(s) => Some(s.clone()),
                _ => None,
            });
            let field_value = FieldValue::value(GqlValue::Object(obj));
            match type_name {
                Some(name) => Some(field_value.with_type(name)),
                None => Some(field_value),
            }
        }
        other => Some(FieldValue::value(other)),
    }
}

/// Converts a JSON value into a resolved field value.
#[must_use]
pub fn json_to_field_value(json: JsonValue) -> Option<FieldValue<'static>> {
    gql_to_field_value(json_to_gql(json))
}
