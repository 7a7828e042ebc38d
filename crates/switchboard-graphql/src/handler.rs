//! Axum HTTP handlers for the gateway.
//!
//! The embedding server owns routing, CORS and connection lifecycle; this
//! module only translates between HTTP and gateway execution. Responses
//! follow standard GraphQL conventions: field-level failures ride alongside
//! partial data with status 200, requests rejected before execution
//! (parse/validation) get a 400, and regeneration failures map through
//! [`GatewayError::status_code`].

use std::sync::Arc;

use async_graphql::Response;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing::post};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchboard_broker::CallContext;
use tracing::warn;

use crate::error::GatewayError;
use crate::gateway::GraphqlGateway;

/// State shared across GraphQL handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub gateway: Arc<GraphqlGateway>,
}

/// GraphQL request body.
#[derive(Debug, Deserialize)]
pub struct GraphQLRequest {
    /// The GraphQL query string.
    pub query: String,

    /// Optional operation name for multi-operation documents.
    #[serde(rename = "operationName")]
    pub operation_name: Option<String>,

    /// Optional variables for the query.
    pub variables: Option<Value>,
}

/// Serialized GraphQL response body.
#[derive(Debug, Serialize)]
pub struct GraphQLResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Value>,
}

impl From<Response> for GraphQLResponse {
    fn from(response: Response) -> Self {
        let data = serde_json::to_value(&response.data).unwrap_or(Value::Null);
        let data = if data.is_null() { None } else { Some(data) };

        let errors = response
            .errors
            .iter()
            .map(|error| {
                serde_json::to_value(error).unwrap_or_else(|_| {
                    serde_json::json!({ "message": error.message })
                })
            })
            .collect();

        Self { data, errors }
    }
}

/// Builds a router exposing the gateway at `/graphql`.
#[must_use]
pub fn router(gateway: Arc<GraphqlGateway>) -> Router {
    Router::new()
        .route("/graphql", post(graphql_handler))
        .with_state(GatewayState { gateway })
}

/// `POST /graphql` handler.
pub async fn graphql_handler(
    State(state): State<GatewayState>,
    Json(request): Json<GraphQLRequest>,
) -> impl IntoResponse {
    let call_ctx = CallContext::new();

    match state
        .gateway
        .execute(
            &request.query,
            request.operation_name.as_deref(),
            request.variables,
            call_ctx,
        )
        .await
    {
        Ok(response) => {
            let status = if rejected_before_execution(&response) {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            };
            (status, Json(GraphQLResponse::from(response))).into_response()
        }
        Err(err) => {
            warn!(error = %err, "GraphQL request failed before execution");
            let status =
                StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let body = serde_json::json!({
                "errors": [{
                    "message": err.to_string(),
                    "extensions": { "code": err.error_code() }
                }]
            });
            (status, Json(body)).into_response()
        }
    }
}

/// A response with no data and only path-less errors never reached a
/// resolver: the request failed parsing or validation.
fn rejected_before_execution(response: &Response) -> bool {
    response.data == async_graphql::Value::Null
        && !response.errors.is_empty()
        && response.errors.iter().all(|error| error.path.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_operation_name() {
        let request: GraphQLRequest = serde_json::from_value(serde_json::json!({
            "query": "{ hello }",
            "operationName": "Op",
            "variables": { "a": 1 }
        }))
        .unwrap();

        assert_eq!(request.query, "{ hello }");
        assert_eq!(request.operation_name.as_deref(), Some("Op"));
        assert!(request.variables.is_some());
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let body = GraphQLResponse {
            data: Some(serde_json::json!({"hello": "world"})),
            errors: Vec::new(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("errors").is_none());
        assert_eq!(json["data"]["hello"], "world");
    }
}
