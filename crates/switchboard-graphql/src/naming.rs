//! Action name resolution.
//!
//! Service full names follow [`ServiceDescriptor::resolved_name`]; this module
//! covers the other half of the naming rule: qualifying resolver action
//! references with their owning service.
//!
//! [`ServiceDescriptor::resolved_name`]: switchboard_broker::ServiceDescriptor::resolved_name

/// Qualifies an action reference with its owning service's resolved name.
///
/// A reference that already contains a `.` is treated as fully qualified and
/// returned verbatim. With no owning service (globally configured resolvers),
/// the reference is returned as-is.
#[must_use]
pub fn resolver_action_name(service_name: Option<&str>, action: &str) -> String {
    if action.contains('.') {
        return action.to_string();
    }
    match service_name {
        Some(service) => format!("{service}.{action}"),
        None => action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unqualified_reference_gets_service_prefix() {
        assert_eq!(
            resolver_action_name(Some("v2.users"), "resolve"),
            "v2.users.resolve"
        );
    }

    #[test]
    fn test_qualified_reference_is_verbatim() {
        assert_eq!(
            resolver_action_name(Some("posts"), "users.resolve"),
            "users.resolve"
        );
    }

    #[test]
    fn test_global_reference_without_service() {
        assert_eq!(resolver_action_name(None, "users"), "users");
    }
}
