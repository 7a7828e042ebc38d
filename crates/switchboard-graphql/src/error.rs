//! Error types for the aggregation gateway.
//!
//! Schema compilation failures are fatal for the regeneration attempt that
//! raised them: the schema stays stale and the error propagates to whichever
//! request triggered the rebuild. Resolver call failures surface as GraphQL
//! field errors unless the field's declaration opted into `null_if_error`.

use async_graphql::ErrorExtensions;
use switchboard_broker::CallError;

/// Errors surfaced by the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Fragment merging or executable-schema construction failed.
    #[error("Unable to compile GraphQL schema: {message}")]
    SchemaCompilation { message: String },

    /// A remote call made by a synthesized resolver failed.
    #[error(transparent)]
    Call(#[from] CallError),

    /// The inbound request is malformed or cannot be executed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Gateway configuration rejected at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::SchemaCompilation { .. } => 500,
            Self::Call(err) => err.code,
            Self::InvalidRequest(_) => 400,
            Self::Configuration(_) => 500,
            Self::Internal(_) => 500,
        }
    }

    /// Returns the machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &str {
        match self {
            Self::SchemaCompilation { .. } => "UNABLE_COMPILE_GRAPHQL_SCHEMA",
            Self::Call(err) => &err.kind,
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Converts into a GraphQL field error with a `code` extension.
    #[must_use]
    pub fn into_field_error(self) -> async_graphql::Error {
        let code = self.error_code().to_string();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", code))
    }
}
