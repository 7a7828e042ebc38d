//! Schema generation and lifecycle.
//!
//! - [`generator`] - the collect → compose → synthesize → compile pipeline
//! - [`compile`] - executable schema construction from the composed document
//! - [`controller`] - dirty-flag lifecycle with single-flight regeneration

pub mod compile;
pub mod controller;
pub mod generator;

pub use compile::compile as compile_schema;
pub use controller::SchemaController;
pub use generator::{CompiledSchema, SchemaGenerator};
