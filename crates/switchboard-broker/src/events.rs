//! Event plumbing: the fleet-wide service bus and the gateway's tagged pub/sub.
//!
//! Both are thin facades over `tokio::sync::broadcast`. The service bus carries
//! framework notifications (topology changes, schema invalidation, the
//! schema-updated announcement); the pub/sub carries the tagged events that
//! feed GraphQL subscription streams.

use serde_json::Value;
use tokio::sync::broadcast;

/// Maximum number of events buffered per channel before slow receivers lag.
const EVENT_BUFFER_SIZE: usize = 1024;

/// Well-known service bus topics.
pub mod topics {
    /// Emitted by the registry whenever the service topology changes.
    pub const TOPOLOGY_CHANGED: &str = "$services.changed";

    /// Explicit request to mark the aggregated schema stale.
    pub const SCHEMA_INVALIDATE: &str = "graphql.invalidate";

    /// Emitted by the gateway after a successful regeneration, with the
    /// printed schema text under `schema`.
    pub const SCHEMA_UPDATED: &str = "graphql.schema.updated";
}

/// A framework-level notification.
#[derive(Debug, Clone)]
pub struct BusEvent {
    pub topic: String,
    pub payload: Value,
}

/// Broadcast bus for framework notifications.
#[derive(Clone)]
pub struct ServiceBus {
    sender: broadcast::Sender<BusEvent>,
}

impl ServiceBus {
    /// Creates a new bus.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { sender }
    }

    /// Publishes an event, returning the number of receivers it reached.
    pub fn publish(&self, topic: impl Into<String>, payload: Value) -> usize {
        let event = BusEvent {
            topic: topic.into(),
            payload,
        };
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to all bus events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ServiceBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// A tagged event delivered to subscription streams.
#[derive(Debug, Clone)]
pub struct PubSubEvent {
    pub tag: String,
    pub payload: Value,
}

/// Tagged fan-out for GraphQL subscriptions.
///
/// Subscription resolvers subscribe to the full stream and filter by tag;
/// publishing is fire-and-forget.
#[derive(Clone)]
pub struct PubSub {
    sender: broadcast::Sender<PubSubEvent>,
}

impl PubSub {
    /// Creates a new pub/sub channel.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { sender }
    }

    /// Publishes `payload` under `tag`, returning the number of receivers.
    pub fn publish(&self, tag: impl Into<String>, payload: Value) -> usize {
        let event = PubSubEvent {
            tag: tag.into(),
            payload,
        };
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribes to every published event.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PubSubEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PubSub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PubSub")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
