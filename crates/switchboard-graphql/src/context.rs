//! Per-request execution context.
//!
//! Constructed once per inbound GraphQL request and injected into the
//! execution engine as request data. Holds the remote-call handle and the
//! request's private loader cache; the compiled schema itself is shared
//! gateway state and never lives here.

use std::sync::Arc;

use switchboard_broker::{CallContext, Caller, LoaderOptions};

use crate::loaders::{LoaderMap, LoaderOptionMap};

/// Dependencies synthesized resolvers reach for at execution time.
pub struct GraphqlContext {
    /// Remote-call handle.
    pub caller: Arc<dyn Caller>,

    /// Call metadata propagated into every downstream invocation.
    pub call_ctx: CallContext,

    /// This request's batching loaders, created lazily per call site.
    pub loaders: LoaderMap,

    /// Per-action loader configuration from the current compiled schema.
    pub loader_options: Arc<LoaderOptionMap>,

    /// Gateway-wide loader defaults from configuration.
    pub loader_defaults: LoaderOptions,
}

impl GraphqlContext {
    /// Creates a fresh request context with an empty loader cache.
    #[must_use]
    pub fn new(
        caller: Arc<dyn Caller>,
        call_ctx: CallContext,
        loader_options: Arc<LoaderOptionMap>,
        loader_defaults: LoaderOptions,
    ) -> Self {
        Self {
            caller,
            call_ctx,
            loaders: LoaderMap::new(),
            loader_options,
            loader_defaults,
        }
    }
}

impl std::fmt::Debug for GraphqlContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlContext")
            .field("request_id", &self.call_ctx.request_id)
            .field("loaders", &self.loaders)
            .finish_non_exhaustive()
    }
}
