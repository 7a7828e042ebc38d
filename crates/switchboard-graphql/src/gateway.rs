//! The aggregation gateway.
//!
//! [`GraphqlGateway`] owns the schema lifecycle controller, the subscription
//! pub/sub and the dependency bundle (registry, caller, bus), and fronts
//! request execution: every inbound request first ensures the compiled
//! schema is current, then executes against it with a fresh per-request
//! context.
//!
//! The event loop wires the service bus into the lifecycle: topology changes
//! mark the schema stale (when auto-update is enabled), explicit
//! invalidation always does, and the configured publish event feeds the
//! subscription pub/sub.

use std::sync::Arc;

use async_graphql::{Request, Response, Variables};
use serde_json::Value;
use switchboard_broker::{
    ActionDescriptor, BusEvent, CallContext, CallError, Caller, LoaderOptions, PubSub, ServiceBus,
    ServiceRegistry, handler_fn, topics,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::context::GraphqlContext;
use crate::error::GatewayError;
use crate::resolvers::ResolverDeps;
use crate::schema::{CompiledSchema, SchemaController, SchemaGenerator};

/// GraphQL aggregation gateway over a service registry.
pub struct GraphqlGateway {
    config: Arc<GatewayConfig>,
    caller: Arc<dyn Caller>,
    bus: ServiceBus,
    pubsub: PubSub,
    controller: SchemaController,
}

impl GraphqlGateway {
    /// Creates a gateway over `registry`, calling out through `caller` and
    /// listening/announcing on `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Configuration`] when the configuration is
    /// invalid.
    pub fn new(
        config: GatewayConfig,
        registry: Arc<dyn ServiceRegistry>,
        caller: Arc<dyn Caller>,
        bus: ServiceBus,
    ) -> Result<Arc<Self>, GatewayError> {
        config.validate().map_err(GatewayError::Configuration)?;
        let config = Arc::new(config);

        let pubsub = PubSub::new();
        let deps = ResolverDeps {
            caller: Arc::clone(&caller),
            pubsub: pubsub.clone(),
        };
        let generator = SchemaGenerator::new(registry, deps, Arc::clone(&config));
        let controller = SchemaController::new(generator, bus.clone());

        Ok(Arc::new(Self {
            config,
            caller,
            bus,
            pubsub,
            controller,
        }))
    }

    /// The pub/sub feeding subscription streams.
    #[must_use]
    pub fn pubsub(&self) -> &PubSub {
        &self.pubsub
    }

    /// Marks the compiled schema stale.
    pub fn invalidate_schema(&self) {
        debug!("GraphQL schema invalidated");
        self.controller.invalidate();
    }

    /// Ensures a current compiled schema exists, regenerating if stale.
    ///
    /// # Errors
    ///
    /// Propagates regeneration failures; the schema stays stale.
    pub async fn prepare_schema(&self) -> Result<Arc<CompiledSchema>, GatewayError> {
        self.controller.current().await
    }

    /// The printed schema text of the current compiled schema, if any.
    pub async fn schema_sdl(&self) -> Option<String> {
        self.controller.peek().await.map(|c| c.sdl.clone())
    }

    /// Executes one GraphQL request against the current schema.
    ///
    /// # Errors
    ///
    /// Fails when regeneration fails or the schema exposes no executable
    /// operations. Field-level resolver failures do not fail the call; they
    /// surface inside the response alongside partial data.
    pub async fn execute(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: Option<Value>,
        call_ctx: CallContext,
    ) -> Result<Response, GatewayError> {
        let compiled = self.prepare_schema().await?;
        let Some(schema) = &compiled.schema else {
            return Err(GatewayError::InvalidRequest(
                "schema exposes no executable operations".to_string(),
            ));
        };

        let request = self.build_request(&compiled, query, operation_name, variables, call_ctx);
        Ok(schema.execute(request).await)
    }

    /// Executes a subscription request, yielding one response per event.
    ///
    /// # Errors
    ///
    /// Fails under the same conditions as [`execute`](Self::execute).
    pub async fn execute_stream(
        &self,
        query: &str,
        operation_name: Option<&str>,
        variables: Option<Value>,
        call_ctx: CallContext,
    ) -> Result<impl futures_util::Stream<Item = Response> + Send + 'static, GatewayError> {
        let compiled = self.prepare_schema().await?;
        let Some(schema) = compiled.schema.clone() else {
            return Err(GatewayError::InvalidRequest(
                "schema exposes no executable operations".to_string(),
            ));
        };

        let request = self.build_request(&compiled, query, operation_name, variables, call_ctx);
        Ok(async_stream::stream! {
            let mut responses = schema.execute_stream(request);
            while let Some(response) = futures_util::StreamExt::next(&mut responses).await {
                yield response;
            }
        })
    }

    fn build_request(
        &self,
        compiled: &CompiledSchema,
        query: &str,
        operation_name: Option<&str>,
        variables: Option<Value>,
        call_ctx: CallContext,
    ) -> Request {
        let mut request = Request::new(query);
        if let Some(name) = operation_name {
            request = request.operation_name(name);
        }
        if let Some(variables) = variables {
            request = request.variables(Variables::from_json(variables));
        }

        let context = GraphqlContext::new(
            Arc::clone(&self.caller),
            call_ctx,
            Arc::clone(&compiled.loader_options),
            LoaderOptions {
                max_batch_size: self.config.loader_max_batch_size,
                delay_ms: self.config.loader_delay_ms,
            },
        );
        request.data(context)
    }

    /// The generic request-reply action wrapping ad-hoc query execution, or
    /// `None` when `create_action` is disabled.
    ///
    /// Embedders register this on their broker so remote services can run
    /// GraphQL queries without going through HTTP.
    #[must_use]
    pub fn graphql_action(self: &Arc<Self>) -> Option<ActionDescriptor> {
        if !self.config.create_action {
            return None;
        }

        let gateway = Arc::clone(self);
        Some(
            ActionDescriptor::new("graphql").with_handler(handler_fn(move |params, ctx| {
                let gateway = Arc::clone(&gateway);
                async move {
                    let query = params
                        .get("query")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            CallError::new("Parameter 'query' is required", 422, "VALIDATION_ERROR")
                        })?
                        .to_string();
                    let variables = params.get("variables").cloned();

                    let response = gateway
                        .execute(&query, None, variables, ctx)
                        .await
                        .map_err(|err| {
                            CallError::new(err.to_string(), err.status_code(), err.error_code())
                        })?;
                    serde_json::to_value(&response).map_err(|err| {
                        CallError::new(err.to_string(), 500, "RESPONSE_SERIALIZATION")
                    })
                }
            })),
        )
    }

    /// Spawns the bus event loop. Aborting the returned handle tears the
    /// loop down with the gateway.
    pub fn spawn_event_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let gateway = Arc::clone(self);
        let mut rx = self.bus.subscribe();
        info!("GraphQL gateway event loop started");
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => gateway.handle_bus_event(event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "gateway event loop lagged, invalidating schema");
                        gateway.invalidate_schema();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Applies one bus event to the gateway state.
    pub fn handle_bus_event(&self, event: BusEvent) {
        if event.topic == topics::TOPOLOGY_CHANGED {
            if self.config.auto_update_schema {
                self.invalidate_schema();
            }
        } else if event.topic == topics::SCHEMA_INVALIDATE {
            self.invalidate_schema();
        } else if event.topic == self.config.subscription_event_name {
            let Some(tag) = event.payload.get("tag").and_then(Value::as_str) else {
                warn!(
                    topic = %event.topic,
                    "publish event without a 'tag' field, dropping"
                );
                return;
            };
            let payload = event
                .payload
                .get("payload")
                .cloned()
                .unwrap_or(Value::Null);
            self.pubsub.publish(tag, payload);
        }
    }
}

impl std::fmt::Debug for GraphqlGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphqlGateway")
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use switchboard_broker::LocalBroker;

    fn gateway_over(broker: Arc<LocalBroker>, config: GatewayConfig) -> Arc<GraphqlGateway> {
        let bus = broker.bus();
        GraphqlGateway::new(
            config,
            broker.clone() as Arc<dyn ServiceRegistry>,
            broker as Arc<dyn Caller>,
            bus,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_topology_event_marks_stale_when_auto_update() {
        let broker = Arc::new(LocalBroker::new());
        let gateway = gateway_over(broker, GatewayConfig::default());

        let _ = gateway.prepare_schema().await;
        assert!(!gateway.controller.is_stale());

        gateway.handle_bus_event(BusEvent {
            topic: topics::TOPOLOGY_CHANGED.into(),
            payload: json!({}),
        });
        assert!(gateway.controller.is_stale());
    }

    #[tokio::test]
    async fn test_topology_event_ignored_without_auto_update() {
        let broker = Arc::new(LocalBroker::new());
        let mut config = GatewayConfig::default();
        config.auto_update_schema = false;
        let gateway = gateway_over(broker, config);

        let _ = gateway.prepare_schema().await;
        gateway.handle_bus_event(BusEvent {
            topic: topics::TOPOLOGY_CHANGED.into(),
            payload: json!({}),
        });
        assert!(!gateway.controller.is_stale());

        // Explicit invalidation always applies.
        gateway.handle_bus_event(BusEvent {
            topic: topics::SCHEMA_INVALIDATE.into(),
            payload: json!({}),
        });
        assert!(gateway.controller.is_stale());
    }

    #[tokio::test]
    async fn test_publish_event_feeds_pubsub() {
        let broker = Arc::new(LocalBroker::new());
        let gateway = gateway_over(broker, GatewayConfig::default());

        let mut rx = gateway.pubsub().subscribe();
        gateway.handle_bus_event(BusEvent {
            topic: "graphql.publish".into(),
            payload: json!({"tag": "TEST", "payload": {"n": 7}}),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(event.tag, "TEST");
        assert_eq!(event.payload["n"], 7);
    }

    #[tokio::test]
    async fn test_graphql_action_respects_create_action_flag() {
        let broker = Arc::new(LocalBroker::new());
        let gateway = gateway_over(broker.clone(), GatewayConfig::default());
        assert!(gateway.graphql_action().is_some());

        let mut config = GatewayConfig::default();
        config.create_action = false;
        let gateway = gateway_over(broker, config);
        assert!(gateway.graphql_action().is_none());
    }
}
