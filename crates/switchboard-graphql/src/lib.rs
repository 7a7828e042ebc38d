//! # switchboard-graphql
//!
//! Schema aggregation and resolver dispatch engine for the Switchboard
//! gateway: exposes the actions of a dynamic fleet of services as one
//! executable GraphQL schema.
//!
//! The engine walks the live service registry, merges each service's and
//! action's GraphQL declaration fragments into one schema document,
//! synthesizes resolver functions that translate field resolution into
//! remote calls (batched through request-scoped loaders where declared), and
//! keeps the compiled schema consistent as services join and leave the
//! fleet.
//!
//! ## Overview
//!
//! The compiled schema is regenerated lazily: topology changes mark it
//! stale, and the next request rebuilds it exactly once regardless of how
//! many requests race in. Readers always see either the fully-old or the
//! fully-new schema.
//!
//! ## Modules
//!
//! - [`config`] - configuration options
//! - [`collect`] - declaration collection from registry snapshots
//! - [`compose`] - schema text composition and field-name extraction
//! - [`resolvers`] - resolver synthesis (direct, loader-backed, subscription)
//! - [`loaders`] - request-scoped batching loaders
//! - [`schema`] - generation pipeline and lifecycle control
//! - [`gateway`] - the gateway front: execution, event loop, generic action
//! - [`handler`] - axum HTTP handlers
//! - [`context`] - per-request execution context
//! - [`error`] - error types for gateway operations

pub mod collect;
pub mod compose;
pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod loaders;
pub mod naming;
pub mod params;
pub mod resolvers;
pub mod schema;
pub mod value;

// Re-export main types
pub use config::GatewayConfig;
pub use context::GraphqlContext;
pub use error::GatewayError;
pub use gateway::GraphqlGateway;
pub use handler::{GatewayState, graphql_handler, router};
pub use schema::{CompiledSchema, SchemaController, SchemaGenerator};

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
