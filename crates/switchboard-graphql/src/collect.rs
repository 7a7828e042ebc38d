//! Declaration collection.
//!
//! Walks a registry snapshot and extracts, per service, its service-level
//! declaration and the action-level declarations of its GraphQL-declaring
//! actions. Pure read: the snapshot is never mutated. Duplicate entries for
//! the same logical service (by resolved full name) are tolerated; only the
//! first occurrence is processed.

use std::collections::HashSet;

use switchboard_broker::{ActionGraphql, ActionVisibility, ServiceDescriptor, ServiceGraphql};
use tracing::{debug, trace};

/// One GraphQL-declaring action, with its fleet-qualified name.
#[derive(Debug, Clone)]
pub struct CollectedAction {
    pub qualified_name: String,
    pub graphql: ActionGraphql,
}

/// The declarations one service contributes to a regeneration pass.
#[derive(Debug, Clone)]
pub struct ServiceDeclarations {
    /// The service's resolved full name.
    pub service_name: String,
    pub graphql: Option<ServiceGraphql>,
    pub actions: Vec<CollectedAction>,
}

/// Collects declarations from a registry snapshot.
///
/// Services and actions without a declaration are skipped entirely. With
/// `check_visibility` set, actions not marked `published` are excluded.
#[must_use]
pub fn collect(services: &[ServiceDescriptor], check_visibility: bool) -> Vec<ServiceDeclarations> {
    let mut processed: HashSet<String> = HashSet::new();
    let mut collected = Vec::new();

    for service in services {
        let service_name = service.resolved_name();
        if !processed.insert(service_name.clone()) {
            trace!(service = %service_name, "skipping duplicate service instance");
            continue;
        }

        let actions: Vec<CollectedAction> = service
            .actions
            .iter()
            .filter(|action| {
                !check_visibility || action.visibility == ActionVisibility::Published
            })
            .filter_map(|action| {
                action.graphql.as_ref().map(|graphql| CollectedAction {
                    qualified_name: action.qualified_name(&service_name),
                    graphql: graphql.clone(),
                })
            })
            .collect();

        if service.graphql.is_none() && actions.is_empty() {
            trace!(service = %service_name, "service declares no GraphQL, skipping");
            continue;
        }

        collected.push(ServiceDeclarations {
            service_name,
            graphql: service.graphql.clone(),
            actions,
        });
    }

    debug!(
        services = collected.len(),
        "collected GraphQL declarations from registry snapshot"
    );
    collected
}
