//! Gateway configuration.
//!
//! All knobs the aggregation engine recognizes. The HTTP route itself (path,
//! CORS, body limits) belongs to the embedding gateway and is deliberately
//! absent here.
//!
//! # Example Configuration
//!
//! ```toml
//! [graphql]
//! type_defs = ["scalar Timestamp"]
//! subscription_event_name = "graphql.publish"
//! check_action_visibility = true
//! ```

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use switchboard_broker::FieldResolverSpec;

/// Aggregation gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base type-definition fragments, always included in the composed
    /// schema even when no service contributes anything.
    #[serde(default)]
    pub type_defs: Vec<String>,

    /// Globally configured resolvers, keyed by type name then field name.
    /// Service- and action-level resolvers shadow these per type+field.
    #[serde(default)]
    pub resolvers: HashMap<String, IndexMap<String, FieldResolverSpec>>,

    /// Directive definition fragments appended verbatim to the composed
    /// schema document.
    #[serde(default)]
    pub schema_directives: Vec<String>,

    /// Bus topic whose events are republished into the subscription pub/sub.
    /// Default: "graphql.publish"
    #[serde(default = "default_subscription_event_name")]
    pub subscription_event_name: String,

    /// Expose a generic request-reply action wrapping ad-hoc query execution.
    /// Default: true
    #[serde(default = "default_create_action")]
    pub create_action: bool,

    /// Exclude actions not marked `published` from aggregation.
    /// Default: false
    #[serde(default)]
    pub check_action_visibility: bool,

    /// Mark the schema stale automatically on topology-change events.
    /// When disabled, only explicit invalidation triggers regeneration.
    /// Default: true
    #[serde(default = "default_auto_update_schema")]
    pub auto_update_schema: bool,

    /// Gateway-wide batching delay for loaders, overridable per action.
    #[serde(default)]
    pub loader_delay_ms: Option<u64>,

    /// Gateway-wide maximum batch size for loaders, overridable per action.
    #[serde(default)]
    pub loader_max_batch_size: Option<usize>,
}

fn default_subscription_event_name() -> String {
    "graphql.publish".to_string()
}

fn default_create_action() -> bool {
    true
}

fn default_auto_update_schema() -> bool {
    true
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            type_defs: Vec::new(),
            resolvers: HashMap::new(),
            schema_directives: Vec::new(),
            subscription_event_name: default_subscription_event_name(),
            create_action: default_create_action(),
            check_action_visibility: false,
            auto_update_schema: default_auto_update_schema(),
            loader_delay_ms: None,
            loader_max_batch_size: None,
        }
    }
}

impl GatewayConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message if configuration values are invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.subscription_event_name.is_empty() {
            return Err("subscription_event_name must not be empty".into());
        }
        if self.loader_max_batch_size == Some(0) {
            return Err("loader_max_batch_size must be > 0 when set".into());
        }
        Ok(())
    }
}
