//! Service and action descriptors.
//!
//! A service is a named, independently deployable unit exposing remote-callable
//! actions. Services and actions may carry GraphQL declaration blocks: raw
//! schema-language fragments keyed by kind, plus resolver wiring that tells the
//! gateway how a GraphQL field maps onto an action call.
//!
//! Declarations are plain data. The registry owns the descriptors; the gateway
//! only reads point-in-time snapshots of them during schema regeneration.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::ActionHandler;

/// Service version qualifier, numeric (`v5.posts`) or labelled (`staging.posts`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceVersion {
    Number(u32),
    Label(String),
}

impl From<u32> for ServiceVersion {
    fn from(v: u32) -> Self {
        Self::Number(v)
    }
}

impl From<&str> for ServiceVersion {
    fn from(v: &str) -> Self {
        Self::Label(v.to_string())
    }
}

/// Action visibility within the fleet.
///
/// Only `published` actions are exposed through the gateway when visibility
/// checking is enabled in the gateway configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVisibility {
    #[default]
    Published,
    Public,
    Protected,
    Private,
}

/// One or more raw schema-language fragments.
///
/// Declarations accept either a single string or a list, so an action can
/// contribute several fields of the same kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Fragments {
    One(String),
    Many(Vec<String>),
}

impl Fragments {
    /// Iterates over the contained fragments.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &str> + '_> {
        match self {
            Fragments::One(s) => Box::new(std::iter::once(s.as_str())),
            Fragments::Many(v) => Box::new(v.iter().map(String::as_str)),
        }
    }
}

impl From<&str> for Fragments {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for Fragments {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<Vec<String>> for Fragments {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

/// GraphQL declaration block, shared by service- and action-level declarations.
///
/// Fragment lists accumulate in service/action traversal order during one
/// regeneration pass; root operation types are synthesized only when at least
/// one fragment of that kind exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphqlDeclaration {
    #[serde(default)]
    pub query: Option<Fragments>,
    #[serde(default)]
    pub mutation: Option<Fragments>,
    #[serde(default)]
    pub subscription: Option<Fragments>,
    #[serde(default, rename = "type")]
    pub types: Option<Fragments>,
    #[serde(default, rename = "interface")]
    pub interfaces: Option<Fragments>,
    #[serde(default, rename = "union")]
    pub unions: Option<Fragments>,
    #[serde(default, rename = "enum")]
    pub enums: Option<Fragments>,
    #[serde(default, rename = "input")]
    pub inputs: Option<Fragments>,
}

impl GraphqlDeclaration {
    /// Returns whether the block declares nothing at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.query.is_none()
            && self.mutation.is_none()
            && self.subscription.is_none()
            && self.types.is_none()
            && self.interfaces.is_none()
            && self.unions.is_none()
            && self.enums.is_none()
            && self.inputs.is_none()
    }
}

/// Per-action batching loader configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderOptions {
    /// Maximum keys dispatched in one batch call.
    #[serde(default)]
    pub max_batch_size: Option<usize>,

    /// How long to wait for additional keys before dispatching a batch.
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

/// Resolver wiring for one GraphQL field.
///
/// Either a bare action name, a full [`ActionResolverSpec`], or a plain
/// constant value resolved as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldResolverSpec {
    Action(String),
    Def(ActionResolverSpec),
    Value(Value),
}

/// Full remote-call resolver definition for a field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResolverSpec {
    /// Target action. Qualified with the owning service's resolved name
    /// unless it already contains a `.`.
    pub action: String,

    /// Root-to-argument mapping: dot-path into the parent object → dot-path
    /// into the outgoing params. Entry order matters: the batching loader
    /// path keys off the first entry.
    #[serde(default)]
    pub root_params: IndexMap<String, String>,

    /// Static params merged into every call, lowest precedence.
    #[serde(default)]
    pub params: serde_json::Map<String, Value>,

    /// Batch same-key resolutions through a request-scoped loader.
    #[serde(default)]
    pub data_loader: bool,

    /// Skip root-param entries whose source value is null or absent.
    ///
    /// Ignored on the loader path: only the first root-param entry is
    /// consulted there, and a nullish key already short-circuits to null.
    #[serde(default)]
    pub skip_null_keys: bool,

    /// Resolve to null instead of propagating a failed call.
    #[serde(default)]
    pub null_if_error: bool,

    /// Loader tuning for this action, applied when `data_loader` is set.
    #[serde(default)]
    pub loader_options: Option<LoaderOptions>,
}

impl ActionResolverSpec {
    /// Creates a minimal spec targeting `action`.
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            root_params: IndexMap::new(),
            params: serde_json::Map::new(),
            data_loader: false,
            skip_null_keys: false,
            null_if_error: false,
            loader_options: None,
        }
    }
}

/// Service-level GraphQL declaration: fragments plus resolver wiring keyed by
/// type name and field name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceGraphql {
    #[serde(flatten)]
    pub declaration: GraphqlDeclaration,

    #[serde(default)]
    pub resolvers: HashMap<String, IndexMap<String, FieldResolverSpec>>,
}

/// Action-level GraphQL declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActionGraphql {
    #[serde(flatten)]
    pub declaration: GraphqlDeclaration,

    /// Pub/sub tags a subscription declaration listens on.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Action called per event to decide whether it is forwarded.
    #[serde(default)]
    pub filter: Option<String>,

    /// Loader tuning applied when another resolver batches through this action.
    #[serde(default)]
    pub loader_options: Option<LoaderOptions>,
}

/// A remote-callable action exposed by a service.
#[derive(Clone, Serialize, Deserialize)]
pub struct ActionDescriptor {
    /// Unqualified action name; the fleet-wide name is
    /// `<service resolved name>.<name>`.
    pub name: String,

    #[serde(default)]
    pub visibility: ActionVisibility,

    #[serde(default)]
    pub graphql: Option<ActionGraphql>,

    /// Local invocation handle, present when the action runs in-process.
    #[serde(skip)]
    pub handler: Option<Arc<dyn ActionHandler>>,
}

impl ActionDescriptor {
    /// Creates an action descriptor with default visibility and no handler.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: ActionVisibility::default(),
            graphql: None,
            handler: None,
        }
    }

    /// Attaches a GraphQL declaration.
    #[must_use]
    pub fn with_graphql(mut self, graphql: ActionGraphql) -> Self {
        self.graphql = Some(graphql);
        self
    }

    /// Attaches a local handler.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the visibility flag.
    #[must_use]
    pub fn with_visibility(mut self, visibility: ActionVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Fleet-wide action name under the owning service's resolved name.
    #[must_use]
    pub fn qualified_name(&self, service_name: &str) -> String {
        format!("{service_name}.{}", self.name)
    }
}

impl std::fmt::Debug for ActionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDescriptor")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("graphql", &self.graphql)
            .field("handler", &self.handler.as_ref().map(|_| "ActionHandler"))
            .finish()
    }
}

/// A service as seen by the registry: identity, actions and an optional
/// service-level GraphQL declaration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,

    #[serde(default)]
    pub version: Option<ServiceVersion>,

    /// Explicit full name overriding the version-prefix naming rule.
    #[serde(default)]
    pub full_name: Option<String>,

    #[serde(default)]
    pub graphql: Option<ServiceGraphql>,

    #[serde(default)]
    pub actions: Vec<ActionDescriptor>,
}

impl ServiceDescriptor {
    /// Creates a descriptor with no actions.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the version qualifier.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<ServiceVersion>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets an explicit full name.
    #[must_use]
    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Attaches the service-level GraphQL declaration.
    #[must_use]
    pub fn with_graphql(mut self, graphql: ServiceGraphql) -> Self {
        self.graphql = Some(graphql);
        self
    }

    /// Adds an action.
    #[must_use]
    pub fn with_action(mut self, action: ActionDescriptor) -> Self {
        self.actions.push(action);
        self
    }

    /// Resolves the service's full name.
    ///
    /// An explicit full name wins; otherwise a numeric version prefixes
    /// `v<version>.`, a label version prefixes `<version>.`, and an
    /// unversioned service uses its bare name.
    #[must_use]
    pub fn resolved_name(&self) -> String {
        if let Some(full) = &self.full_name {
            return full.clone();
        }
        match &self.version {
            Some(ServiceVersion::Number(n)) => format!("v{n}.{}", self.name),
            Some(ServiceVersion::Label(label)) => format!("{label}.{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Validates the descriptor at ingestion time.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] when identity fields are empty or a
    /// resolver declares loader batching without a root-param key source.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.name.is_empty() {
            return Err(DescriptorError::MissingServiceName);
        }
        for action in &self.actions {
            if action.name.is_empty() {
                return Err(DescriptorError::MissingActionName {
                    service: self.name.clone(),
                });
            }
        }
        if let Some(graphql) = &self.graphql {
            for (type_name, fields) in &graphql.resolvers {
                for (field, spec) in fields {
                    if let FieldResolverSpec::Def(def) = spec
                        && def.data_loader
                        && def.root_params.is_empty()
                    {
                        return Err(DescriptorError::LoaderWithoutRootParams {
                            type_name: type_name.clone(),
                            field: field.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Descriptor validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("service descriptor has an empty name")]
    MissingServiceName,

    #[error("service '{service}' has an action with an empty name")]
    MissingActionName { service: String },

    #[error("resolver {type_name}.{field} enables data_loader but declares no root_params")]
    LoaderWithoutRootParams { type_name: String, field: String },
}
