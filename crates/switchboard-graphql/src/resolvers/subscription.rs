//! Subscription resolvers.
//!
//! A subscription field yields a live stream of events matching the declared
//! tags. Each event is optionally vetted by a remote filter action before
//! being resolved through the target action. One bad event must never kill a
//! long-lived subscription: filter failures drop the event and the stream
//! continues.

use std::sync::Arc;

use async_stream::stream;
use futures_util::Stream;
use serde_json::{Map, Value};
use switchboard_broker::{CallContext, Caller, PubSub};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::error::GatewayError;

/// Resolver for one subscription field.
pub struct SubscriptionResolver {
    action: String,
    tags: Vec<String>,
    filter: Option<String>,
    caller: Arc<dyn Caller>,
    pubsub: PubSub,
}

impl SubscriptionResolver {
    /// Creates a subscription resolver. `action` and `filter` must already be
    /// fleet-qualified.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        tags: Vec<String>,
        filter: Option<String>,
        caller: Arc<dyn Caller>,
        pubsub: PubSub,
    ) -> Self {
        Self {
            action: action.into(),
            tags,
            filter,
            caller,
            pubsub,
        }
    }

    /// Forwards a matched event payload plus the GraphQL arguments to the
    /// target action and returns its result.
    pub async fn resolve_event(
        &self,
        payload: Value,
        args: &Map<String, Value>,
        ctx: &CallContext,
    ) -> Result<Value, GatewayError> {
        let mut params = args.clone();
        params.insert("payload".to_string(), payload);
        let result = self
            .caller
            .call(&self.action, Value::Object(params), ctx)
            .await?;
        Ok(result)
    }

    /// Decides whether an event is forwarded.
    ///
    /// Without a filter action every event passes. A filter call that fails
    /// drops the event rather than erroring the stream.
    pub async fn filter_event(
        &self,
        payload: &Value,
        args: &Map<String, Value>,
        ctx: &CallContext,
    ) -> bool {
        let Some(filter_action) = &self.filter else {
            return true;
        };

        let mut params = args.clone();
        params.insert("payload".to_string(), payload.clone());
        match self
            .caller
            .call(filter_action, Value::Object(params), ctx)
            .await
        {
            Ok(verdict) => is_truthy(&verdict),
            Err(err) => {
                warn!(
                    filter = %filter_action,
                    error = %err,
                    "subscription filter failed, dropping event"
                );
                false
            }
        }
    }

    /// Opens the live event stream for this field.
    ///
    /// Yields the resolved value for every event whose tag matches one of the
    /// declared tags and that passes the filter. With no declared tags the
    /// stream matches nothing.
    pub fn stream(
        self: Arc<Self>,
        args: Map<String, Value>,
        ctx: CallContext,
    ) -> impl Stream<Item = Result<Value, GatewayError>> + Send + 'static {
        let mut rx = self.pubsub.subscribe();
        stream! {
            loop {
                let event = match rx.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, action = %self.action, "subscription stream lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if !self.tags.contains(&event.tag) {
                    continue;
                }
                if !self.filter_event(&event.payload, &args, &ctx).await {
                    continue;
                }

                debug!(action = %self.action, tag = %event.tag, "resolving subscription event");
                yield self.resolve_event(event.payload, &args, &ctx).await;
            }
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl std::fmt::Debug for SubscriptionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionResolver")
            .field("action", &self.action)
            .field("tags", &self.tags)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}
