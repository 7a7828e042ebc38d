//! Resolver synthesis.
//!
//! Builds the resolver map for one regeneration pass: globally configured
//! resolvers first, then service-level wiring (shadowing globals per
//! type+field), then the root operation fields derived from action
//! declarations. Resolvers receive their dependencies as an explicit bundle
//! rather than closing over gateway state.

mod action;
mod subscription;

pub use action::ActionResolver;
pub use subscription::SubscriptionResolver;

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use switchboard_broker::{Caller, FieldResolverSpec, Fragments, PubSub};
use tracing::warn;

use crate::collect::ServiceDeclarations;
use crate::compose::field_name;
use crate::loaders::LoaderOptionMap;
use crate::naming::resolver_action_name;

/// A synthesized resolver bound to one GraphQL field, or a plain value
/// resolved as-is.
#[derive(Debug)]
pub enum FieldResolver {
    Action(ActionResolver),
    Subscription(Arc<SubscriptionResolver>),
    Constant(Value),
}

/// Mapping from GraphQL type name to field name to resolver.
///
/// Built fresh on every regeneration; inserting over an existing entry
/// shadows it, which gives service- and action-level resolvers precedence
/// over globally configured ones.
#[derive(Debug, Default)]
pub struct ResolverMap {
    types: HashMap<String, HashMap<String, Arc<FieldResolver>>>,
}

impl ResolverMap {
    /// Registers a resolver for `type_name.field`, shadowing any previous one.
    pub fn insert(&mut self, type_name: &str, field: &str, resolver: FieldResolver) {
        self.types
            .entry(type_name.to_string())
            .or_default()
            .insert(field.to_string(), Arc::new(resolver));
    }

    /// Looks up the resolver for `type_name.field`.
    #[must_use]
    pub fn get(&self, type_name: &str, field: &str) -> Option<&Arc<FieldResolver>> {
        self.types.get(type_name)?.get(field)
    }

    /// Returns whether any resolver is registered for `type_name`.
    #[must_use]
    pub fn has_type(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }
}

/// Dependency bundle handed to resolver synthesis.
#[derive(Clone)]
pub struct ResolverDeps {
    pub caller: Arc<dyn Caller>,
    pub pubsub: PubSub,
}

/// Builds the resolver map and the per-action loader options for one
/// regeneration pass.
#[must_use]
pub fn build_resolver_map(
    global: &HashMap<String, IndexMap<String, FieldResolverSpec>>,
    collected: &[ServiceDeclarations],
    deps: &ResolverDeps,
) -> (ResolverMap, LoaderOptionMap) {
    let mut map = ResolverMap::default();
    let mut loader_options = LoaderOptionMap::new();

    for (type_name, fields) in global {
        for (field, spec) in fields {
            map.insert(type_name, field, synthesize_field(None, spec, deps));
        }
    }

    for service in collected {
        if let Some(graphql) = &service.graphql {
            for (type_name, fields) in &graphql.resolvers {
                for (field, spec) in fields {
                    map.insert(
                        type_name,
                        field,
                        synthesize_field(Some(&service.service_name), spec, deps),
                    );
                }
            }
        }

        for action in &service.actions {
            if let Some(options) = action.graphql.loader_options {
                loader_options.insert(action.qualified_name.clone(), options);
            }

            let declaration = &action.graphql.declaration;
            register_root_fields(
                &mut map,
                "Query",
                declaration.query.as_ref(),
                &action.qualified_name,
                deps,
            );
            register_root_fields(
                &mut map,
                "Mutation",
                declaration.mutation.as_ref(),
                &action.qualified_name,
                deps,
            );

            if let Some(fragments) = declaration.subscription.as_ref() {
                for fragment in fragments.iter() {
                    let Some(name) = field_name(fragment) else {
                        warn!(
                            action = %action.qualified_name,
                            "could not derive a field name from subscription declaration"
                        );
                        continue;
                    };
                    let filter = action
                        .graphql
                        .filter
                        .as_deref()
                        .map(|f| resolver_action_name(Some(&service.service_name), f));
                    map.insert(
                        "Subscription",
                        &name,
                        FieldResolver::Subscription(Arc::new(SubscriptionResolver::new(
                            action.qualified_name.clone(),
                            action.graphql.tags.clone(),
                            filter,
                            Arc::clone(&deps.caller),
                            deps.pubsub.clone(),
                        ))),
                    );
                }
            }
        }
    }

    (map, loader_options)
}

fn register_root_fields(
    map: &mut ResolverMap,
    root: &str,
    fragments: Option<&Fragments>,
    action_name: &str,
    deps: &ResolverDeps,
) {
    let Some(fragments) = fragments else { return };
    for fragment in fragments.iter() {
        let Some(name) = field_name(fragment) else {
            warn!(
                action = %action_name,
                root = %root,
                "could not derive a field name from declaration"
            );
            continue;
        };
        map.insert(
            root,
            &name,
            FieldResolver::Action(ActionResolver::direct(action_name, Arc::clone(&deps.caller))),
        );
    }
}

fn synthesize_field(
    service: Option<&str>,
    spec: &FieldResolverSpec,
    deps: &ResolverDeps,
) -> FieldResolver {
    match spec {
        FieldResolverSpec::Action(action) => FieldResolver::Action(ActionResolver::direct(
            resolver_action_name(service, action),
            Arc::clone(&deps.caller),
        )),
        FieldResolverSpec::Def(def) => FieldResolver::Action(ActionResolver::from_spec(
            resolver_action_name(service, &def.action),
            def,
            Arc::clone(&deps.caller),
        )),
        FieldResolverSpec::Value(value) => FieldResolver::Constant(value.clone()),
    }
}
