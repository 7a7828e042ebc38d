//! The batching loader behind loader-marked resolvers.
//!
//! One loader instance serves one (action, static params, args) call site
//! within one request. Its batch function issues exactly one remote call per
//! batch, sending the collected keys under the configured batch parameter,
//! and expects a list positionally aligned to the keys it sent. The
//! alignment contract is load-bearing: entries must not be reordered or
//! dropped by the remote side.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::dataloader::Loader;
use serde_json::{Map, Value};
use switchboard_broker::{CallContext, CallError, Caller};
use tracing::{debug, warn};

use super::key::BatchKey;
use crate::params::{merge_defaults, set_path};

/// Batch loader for one action call site.
pub struct ActionLoader {
    caller: Arc<dyn Caller>,
    ctx: CallContext,
    action: String,
    batch_param: String,
    static_params: Map<String, Value>,
    args: Map<String, Value>,
}

impl ActionLoader {
    /// Creates a loader bound to one call site.
    #[must_use]
    pub fn new(
        caller: Arc<dyn Caller>,
        ctx: CallContext,
        action: impl Into<String>,
        batch_param: impl Into<String>,
        static_params: Map<String, Value>,
        args: Map<String, Value>,
    ) -> Self {
        Self {
            caller,
            ctx,
            action: action.into(),
            batch_param: batch_param.into(),
            static_params,
            args,
        }
    }
}

impl Loader<BatchKey> for ActionLoader {
    type Value = Value;
    type Error = CallError;

    async fn load(&self, keys: &[BatchKey]) -> Result<HashMap<BatchKey, Value>, CallError> {
        debug!(
            action = %self.action,
            key_count = keys.len(),
            "dispatching batched remote call"
        );

        let key_values: Vec<Value> = keys.iter().map(|key| key.0.clone()).collect();

        let mut params = self.args.clone();
        set_path(&mut params, &self.batch_param, Value::Array(key_values));
        merge_defaults(&mut params, &self.static_params);

        let result = self
            .caller
            .call(&self.action, Value::Object(params), &self.ctx)
            .await?;

        let Value::Array(results) = result else {
            warn!(action = %self.action, "batch action did not return a list");
            return Err(CallError::new(
                format!("Batched action '{}' must return a list", self.action),
                500,
                "INVALID_BATCH_RESULT",
            ));
        };

        // Positional correspondence: results[i] answers keys[i]. Null or
        // missing positions simply resolve to null for that key instead of
        // failing the whole batch.
        let mut resolved = HashMap::with_capacity(keys.len());
        let mut results = results.into_iter();
        for key in keys {
            match results.next() {
                Some(Value::Null) | None => {}
                Some(value) => {
                    resolved.insert(key.clone(), value);
                }
            }
        }
        Ok(resolved)
    }
}
