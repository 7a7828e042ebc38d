//! Remote-call contract.
//!
//! The gateway never talks to a transport directly. Every invocation it makes
//! (query and mutation actions, loader batches, subscription filters) goes
//! through the [`Caller`] trait with a [`CallContext`] describing the inbound
//! request.
//!
//! [`CallError`] is the wire-level failure shape: a message plus a
//! machine-readable code and kind. It deliberately carries no reference back
//! to the calling context, so it can be serialized into a client response at
//! any depth.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-request call metadata propagated into every downstream invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallContext {
    /// Correlation ID for tracing across services.
    pub request_id: String,

    /// Free-form metadata attached by the gateway boundary (auth claims,
    /// locale, caller identity).
    #[serde(default)]
    pub meta: serde_json::Map<String, Value>,
}

impl CallContext {
    /// Creates a context with a fresh request ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            meta: serde_json::Map::new(),
        }
    }

    /// Creates a context with an explicit request ID.
    #[must_use]
    pub fn with_request_id(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            meta: serde_json::Map::new(),
        }
    }
}

/// Error returned by a remote action call.
///
/// `code` is an HTTP-ish status, `kind` a stable machine-readable tag
/// (`"SERVICE_NOT_FOUND"`, `"VALIDATION_ERROR"`, ...).
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct CallError {
    pub message: String,
    pub code: u16,
    pub kind: String,
    #[serde(default)]
    pub retryable: bool,
}

impl CallError {
    /// Creates a new call error.
    #[must_use]
    pub fn new(message: impl Into<String>, code: u16, kind: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
            kind: kind.into(),
            retryable: false,
        }
    }

    /// Marks the error as retryable.
    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// The error used when no handler is registered for an action name.
    #[must_use]
    pub fn service_not_found(action: &str) -> Self {
        Self::new(
            format!("Service '{action}' is not found"),
            404,
            "SERVICE_NOT_FOUND",
        )
    }
}

/// Invokes a named action somewhere in the fleet.
#[async_trait]
pub trait Caller: Send + Sync {
    /// Calls `action` with `params`, propagating the request context.
    async fn call(&self, action: &str, params: Value, ctx: &CallContext)
    -> Result<Value, CallError>;
}

/// Handler backing a locally registered action.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, params: Value, ctx: CallContext) -> Result<Value, CallError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> ActionHandler for FnHandler<F>
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, CallError>> + Send,
{
    async fn handle(&self, params: Value, ctx: CallContext) -> Result<Value, CallError> {
        (self.0)(params, ctx).await
    }
}

/// Wraps an async closure into an [`ActionHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ActionHandler>
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, CallError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
