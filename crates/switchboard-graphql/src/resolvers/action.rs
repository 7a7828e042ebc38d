//! Direct-call and loader-backed action resolvers.
//!
//! A synthesized resolver translates one GraphQL field resolution into one
//! remote call (direct path) or into a key fed to a request-scoped batching
//! loader (loader path). Parameter shaping merges three layers with fixed
//! precedence: GraphQL arguments override root-derived values, which
//! override the declaration's static params.

use std::sync::Arc;

use serde_json::{Map, Value};
use switchboard_broker::{ActionResolverSpec, Caller, LoaderOptions};
use tracing::debug;

use crate::context::GraphqlContext;
use crate::error::GatewayError;
use crate::loaders::{ActionLoader, BatchKey, build_data_loader, loader_key};
use crate::params::{get_path, merge_defaults, set_path};

/// Resolver for one GraphQL field backed by a remote action.
pub struct ActionResolver {
    action: String,
    root_params: Vec<(String, String)>,
    static_params: Map<String, Value>,
    data_loader: bool,
    skip_null_keys: bool,
    null_if_error: bool,
    loader_options: Option<LoaderOptions>,
    caller: Arc<dyn Caller>,
}

impl ActionResolver {
    /// Creates a plain direct-call resolver for `action` with no parameter
    /// mapping. Used for root operation fields derived from action
    /// declarations.
    #[must_use]
    pub fn direct(action: impl Into<String>, caller: Arc<dyn Caller>) -> Self {
        Self {
            action: action.into(),
            root_params: Vec::new(),
            static_params: Map::new(),
            data_loader: false,
            skip_null_keys: false,
            null_if_error: false,
            loader_options: None,
            caller,
        }
    }

    /// Creates a resolver from a full resolver definition. `action` must
    /// already be fleet-qualified.
    #[must_use]
    pub fn from_spec(action: impl Into<String>, spec: &ActionResolverSpec, caller: Arc<dyn Caller>) -> Self {
        Self {
            action: action.into(),
            root_params: spec
                .root_params
                .iter()
                .map(|(src, dst)| (src.clone(), dst.clone()))
                .collect(),
            static_params: spec.params.clone(),
            data_loader: spec.data_loader,
            skip_null_keys: spec.skip_null_keys,
            null_if_error: spec.null_if_error,
            loader_options: spec.loader_options,
            caller,
        }
    }

    /// The fleet-qualified action this resolver invokes.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Resolves the field for `root` with the GraphQL `args`.
    pub async fn resolve(
        &self,
        root: Option<&Value>,
        args: Map<String, Value>,
        ctx: &GraphqlContext,
    ) -> Result<Value, GatewayError> {
        let result = if self.data_loader {
            self.resolve_via_loader(root, args, ctx).await
        } else {
            self.resolve_direct(root, args, ctx).await
        };

        match result {
            Ok(value) => Ok(value),
            Err(err) if self.null_if_error => {
                debug!(action = %self.action, error = %err, "resolver failed, resolving to null");
                Ok(Value::Null)
            }
            Err(err) => Err(err),
        }
    }

    async fn resolve_direct(
        &self,
        root: Option<&Value>,
        args: Map<String, Value>,
        ctx: &GraphqlContext,
    ) -> Result<Value, GatewayError> {
        let mut params = args;

        if let Some(root) = root {
            let mut derived = Map::new();
            for (src, dst) in &self.root_params {
                match get_path(root, src) {
                    Some(Value::Null) if self.skip_null_keys => {}
                    Some(value) => set_path(&mut derived, dst, value.clone()),
                    // An absent source never produces a param.
                    None => {}
                }
            }
            merge_defaults(&mut params, &derived);
        }
        merge_defaults(&mut params, &self.static_params);

        let result = self
            .caller
            .call(&self.action, Value::Object(params), &ctx.call_ctx)
            .await?;
        Ok(result)
    }

    async fn resolve_via_loader(
        &self,
        root: Option<&Value>,
        args: Map<String, Value>,
        ctx: &GraphqlContext,
    ) -> Result<Value, GatewayError> {
        // The loader path keys off the first root-param entry only.
        let Some((src, dst)) = self.root_params.first() else {
            return Err(GatewayError::Internal(format!(
                "loader resolver for '{}' declares no root_params",
                self.action
            )));
        };

        let key_value = root.and_then(|r| get_path(r, src)).cloned();
        let Some(key_value) = key_value.filter(|v| !v.is_null()) else {
            return Ok(Value::Null);
        };

        let identity = loader_key(&self.action, &self.static_params, &args);
        let options = self
            .loader_options
            .or_else(|| ctx.loader_options.get(&self.action).copied());
        let loader = ctx
            .loaders
            .get_or_create(&identity, || {
                build_data_loader(
                    ActionLoader::new(
                        Arc::clone(&self.caller),
                        ctx.call_ctx.clone(),
                        self.action.clone(),
                        dst.clone(),
                        self.static_params.clone(),
                        args.clone(),
                    ),
                    options,
                    ctx.loader_defaults,
                )
            })
            .await;

        match key_value {
            Value::Array(items) => {
                let keys: Vec<BatchKey> = items.into_iter().map(BatchKey).collect();
                let resolved = loader.load_many(keys.clone()).await?;
                Ok(Value::Array(
                    keys.iter()
                        .map(|key| resolved.get(key).cloned().unwrap_or(Value::Null))
                        .collect(),
                ))
            }
            scalar => {
                let resolved = loader.load_one(BatchKey(scalar)).await?;
                Ok(resolved.unwrap_or(Value::Null))
            }
        }
    }
}

impl std::fmt::Debug for ActionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionResolver")
            .field("action", &self.action)
            .field("data_loader", &self.data_loader)
            .field("null_if_error", &self.null_if_error)
            .finish_non_exhaustive()
    }
}
