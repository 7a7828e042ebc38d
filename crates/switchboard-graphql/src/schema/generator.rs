//! Schema generation pipeline.
//!
//! One regeneration pass: snapshot the registry, collect declarations,
//! compose the schema document, synthesize the resolver map, compile the
//! executable schema. The output is an immutable [`CompiledSchema`] that the
//! lifecycle controller swaps in atomically.

use std::sync::Arc;

use async_graphql::dynamic::Schema;
use switchboard_broker::ServiceRegistry;
use tracing::debug;

use crate::collect::collect;
use crate::compose::SchemaFragments;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::loaders::LoaderOptionMap;
use crate::resolvers::{ResolverDeps, build_resolver_map};
use crate::schema::compile::compile;

/// One regeneration's output: the executable schema (when the document has a
/// `Query` root), the printed schema text, and the per-action loader options.
///
/// Replaced, never mutated: readers always see either a fully-old or
/// fully-new compiled schema.
pub struct CompiledSchema {
    pub schema: Option<Schema>,
    pub sdl: String,
    pub loader_options: Arc<LoaderOptionMap>,
}

impl std::fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("executable", &self.schema.is_some())
            .field("sdl_len", &self.sdl.len())
            .finish_non_exhaustive()
    }
}

/// Drives the collect → compose → synthesize → compile pipeline.
pub struct SchemaGenerator {
    registry: Arc<dyn ServiceRegistry>,
    deps: ResolverDeps,
    config: Arc<GatewayConfig>,
}

impl SchemaGenerator {
    /// Creates a generator over the given registry and dependency bundle.
    #[must_use]
    pub fn new(
        registry: Arc<dyn ServiceRegistry>,
        deps: ResolverDeps,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            registry,
            deps,
            config,
        }
    }

    /// Runs one full regeneration pass.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SchemaCompilation`] when the collected
    /// fragments do not form a valid schema; the caller keeps serving
    /// whatever it had and stays stale.
    pub async fn generate(&self) -> Result<CompiledSchema, GatewayError> {
        let services = self.registry.service_list().await;
        let collected = collect(&services, self.config.check_action_visibility);

        let mut fragments = SchemaFragments::default();
        for service in &collected {
            if let Some(graphql) = &service.graphql {
                fragments.absorb(&graphql.declaration);
            }
            for action in &service.actions {
                fragments.absorb(&action.graphql.declaration);
            }
        }

        let document = fragments.compose(&self.config.type_defs, &self.config.schema_directives);
        let (resolvers, loader_options) =
            build_resolver_map(&self.config.resolvers, &collected, &self.deps);

        let schema = compile(&document, &resolvers)?;
        let sdl = match &schema {
            Some(schema) => schema.sdl(),
            None => document,
        };

        debug!(
            services = collected.len(),
            executable = schema.is_some(),
            "schema generation pass complete"
        );

        Ok(CompiledSchema {
            schema,
            sdl,
            loader_options: Arc::new(loader_options),
        })
    }
}
