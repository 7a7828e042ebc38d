//! # switchboard-broker
//!
//! Broker-side contracts for the Switchboard GraphQL gateway.
//!
//! This crate defines the narrow interfaces through which the gateway talks
//! to the surrounding service fleet:
//!
//! - Service and action descriptors, including their GraphQL declaration
//!   blocks ([`ServiceDescriptor`], [`ActionDescriptor`], [`GraphqlDeclaration`])
//! - The registry snapshot contract ([`ServiceRegistry`])
//! - The remote-call contract ([`Caller`], [`CallContext`], [`CallError`])
//! - The service bus for topology and gateway notifications ([`ServiceBus`])
//! - The tagged pub/sub used by GraphQL subscriptions ([`PubSub`])
//!
//! [`LocalBroker`] is an in-process implementation of the registry and call
//! contracts. It dispatches to registered [`ActionHandler`]s and emits
//! topology-change events, which makes it both a convenient embedding default
//! and the test double used throughout the workspace. It is not a transport:
//! distributed brokers live behind the same traits in their own crates.

pub mod call;
pub mod events;
pub mod registry;
pub mod service;

pub use call::{ActionHandler, CallContext, CallError, Caller, handler_fn};
pub use events::{BusEvent, PubSub, PubSubEvent, ServiceBus, topics};
pub use registry::{LocalBroker, ServiceRegistry};
pub use service::{
    ActionDescriptor, ActionGraphql, ActionResolverSpec, ActionVisibility, DescriptorError,
    FieldResolverSpec, Fragments, GraphqlDeclaration, LoaderOptions, ServiceDescriptor,
    ServiceGraphql, ServiceVersion,
};
