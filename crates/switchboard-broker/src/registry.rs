//! Service registry contract and the in-process broker.
//!
//! The gateway regenerates its schema from point-in-time snapshots of the
//! registry. [`LocalBroker`] implements both the snapshot contract and the
//! call contract for services running in-process, and doubles as the test
//! harness for the rest of the workspace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;

use crate::call::{ActionHandler, CallContext, CallError, Caller};
use crate::events::{ServiceBus, topics};
use crate::service::{DescriptorError, ServiceDescriptor};

/// Read access to the current service topology.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// Returns a point-in-time snapshot of all registered services with
    /// their actions. The snapshot may contain duplicate entries for the
    /// same logical service; consumers process the first occurrence.
    async fn service_list(&self) -> Vec<ServiceDescriptor>;
}

/// In-process registry and dispatcher.
///
/// Registered services keep their descriptors for snapshotting; their
/// actions' handlers are indexed under fleet-qualified names for dispatch.
/// Every registration and removal publishes a topology-change event.
pub struct LocalBroker {
    services: RwLock<Vec<ServiceDescriptor>>,
    handlers: RwLock<HashMap<String, Arc<dyn ActionHandler>>>,
    bus: ServiceBus,
}

impl LocalBroker {
    /// Creates a broker with its own service bus.
    #[must_use]
    pub fn new() -> Self {
        Self::with_bus(ServiceBus::new())
    }

    /// Creates a broker publishing on an existing bus.
    #[must_use]
    pub fn with_bus(bus: ServiceBus) -> Self {
        Self {
            services: RwLock::new(Vec::new()),
            handlers: RwLock::new(HashMap::new()),
            bus,
        }
    }

    /// The bus this broker publishes topology changes on.
    #[must_use]
    pub fn bus(&self) -> ServiceBus {
        self.bus.clone()
    }

    /// Registers a service and announces the topology change.
    ///
    /// # Errors
    ///
    /// Returns a [`DescriptorError`] when the descriptor fails ingestion
    /// validation; nothing is registered in that case.
    pub async fn register(&self, service: ServiceDescriptor) -> Result<(), DescriptorError> {
        service.validate()?;

        let service_name = service.resolved_name();
        {
            let mut handlers = self.handlers.write().await;
            for action in &service.actions {
                if let Some(handler) = &action.handler {
                    handlers.insert(action.qualified_name(&service_name), Arc::clone(handler));
                }
            }
        }
        self.services.write().await.push(service);

        debug!(service = %service_name, "service registered");
        self.bus
            .publish(topics::TOPOLOGY_CHANGED, Value::Object(Default::default()));
        Ok(())
    }

    /// Removes every registration whose resolved name matches and announces
    /// the topology change.
    pub async fn unregister(&self, resolved_name: &str) {
        let mut services = self.services.write().await;
        let mut handlers = self.handlers.write().await;

        services.retain(|svc| {
            if svc.resolved_name() == resolved_name {
                for action in &svc.actions {
                    handlers.remove(&action.qualified_name(resolved_name));
                }
                false
            } else {
                true
            }
        });
        drop(handlers);
        drop(services);

        debug!(service = %resolved_name, "service unregistered");
        self.bus
            .publish(topics::TOPOLOGY_CHANGED, Value::Object(Default::default()));
    }
}

impl Default for LocalBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceRegistry for LocalBroker {
    async fn service_list(&self) -> Vec<ServiceDescriptor> {
        self.services.read().await.clone()
    }
}

#[async_trait]
impl Caller for LocalBroker {
    async fn call(
        &self,
        action: &str,
        params: Value,
        ctx: &CallContext,
    ) -> Result<Value, CallError> {
        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(action).cloned()
        };
        match handler {
            Some(handler) => {
                debug!(action = %action, request_id = %ctx.request_id, "dispatching local call");
                handler.handle(params, ctx.clone()).await
            }
            None => Err(CallError::service_not_found(action)),
        }
    }
}

impl std::fmt::Debug for LocalBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBroker").finish_non_exhaustive()
    }
}
