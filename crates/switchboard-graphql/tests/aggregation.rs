//! End-to-end aggregation tests over an in-process broker.
//!
//! The fixture mirrors a small posts/users fleet: posts declare a `Post`
//! type whose `author` and `voters` fields batch-resolve users, users
//! declare a `User` type whose `posts` field calls back into the posts
//! service.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use assert_json_diff::assert_json_include;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{Value, json};
use switchboard_broker::{
    ActionDescriptor, ActionGraphql, CallContext, CallError, Caller, LocalBroker, ServiceDescriptor,
    ServiceGraphql, ServiceRegistry, handler_fn, topics,
};
use switchboard_graphql::{GatewayConfig, GatewayError, GraphqlGateway};

fn posts_fixture() -> Vec<Value> {
    json!([
        { "id": 1, "title": "First post",  "author": 3, "votes": 2, "voters": [2, 5] },
        { "id": 2, "title": "Second post", "author": 1, "votes": 0, "voters": [] },
        { "id": 3, "title": "Third post",  "author": 2, "votes": 1, "voters": [5] },
        { "id": 4, "title": "4th post",    "author": 3, "votes": 3, "voters": [4, 1, 2] },
        { "id": 5, "title": "5th post",    "author": 5, "votes": 1, "voters": [4] }
    ])
    .as_array()
    .unwrap()
    .clone()
}

fn users_fixture() -> Vec<Value> {
    json!([
        { "id": 1, "name": "Genaro Krueger" },
        { "id": 2, "name": "Nicholas Paris" },
        { "id": 3, "name": "Quinton Loden" },
        { "id": 4, "name": "Bradford Knauer" },
        { "id": 5, "name": "Damien Accetta" }
    ])
    .as_array()
    .unwrap()
    .clone()
}

fn posts_service() -> ServiceDescriptor {
    let graphql: ServiceGraphql = serde_json::from_value(json!({
        "type": "type Post {\nid: Int!\ntitle: String!\nauthor: User\nvotes: Int!\nvoters: [User]\n}",
        "resolvers": {
            "Post": {
                "author": {
                    "action": "users.resolve",
                    "root_params": { "author": "id" },
                    "data_loader": true
                },
                "voters": {
                    "action": "users.resolve",
                    "root_params": { "voters": "id" },
                    "data_loader": true
                }
            }
        }
    }))
    .unwrap();

    ServiceDescriptor::new("posts")
        .with_graphql(graphql)
        .with_action(
            ActionDescriptor::new("find")
                .with_graphql(
                    serde_json::from_value(json!({ "query": "posts(limit: Int): [Post]" }))
                        .unwrap(),
                )
                .with_handler(handler_fn(|params, _ctx| async move {
                    let mut posts = posts_fixture();
                    if let Some(limit) = params.get("limit").and_then(Value::as_u64) {
                        posts.truncate(limit as usize);
                    }
                    Ok(Value::Array(posts))
                })),
        )
        .with_action(
            ActionDescriptor::new("findByUser").with_handler(handler_fn(
                |params, _ctx| async move {
                    let user_id = params.get("userID").cloned().unwrap_or(Value::Null);
                    Ok(Value::Array(
                        posts_fixture()
                            .into_iter()
                            .filter(|post| post["author"] == user_id)
                            .collect(),
                    ))
                },
            )),
        )
}

fn users_service(resolve_calls: Arc<AtomicUsize>) -> ServiceDescriptor {
    let graphql: ServiceGraphql = serde_json::from_value(json!({
        "type": "type User {\nid: Int!\nname: String!\nposts(limit: Int): [Post]\n}",
        "resolvers": {
            "User": {
                "posts": {
                    "action": "posts.findByUser",
                    "root_params": { "id": "userID" }
                }
            }
        }
    }))
    .unwrap();

    ServiceDescriptor::new("users")
        .with_graphql(graphql)
        .with_action(
            ActionDescriptor::new("find")
                .with_graphql(
                    serde_json::from_value(json!({ "query": "users(limit: Int): [User]" }))
                        .unwrap(),
                )
                .with_handler(handler_fn(|params, _ctx| async move {
                    let mut users = users_fixture();
                    if let Some(limit) = params.get("limit").and_then(Value::as_u64) {
                        users.truncate(limit as usize);
                    }
                    Ok(Value::Array(users))
                })),
        )
        .with_action(
            ActionDescriptor::new("resolve").with_handler(handler_fn(move |params, _ctx| {
                let calls = Arc::clone(&resolve_calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let ids = params
                        .get("id")
                        .and_then(Value::as_array)
                        .cloned()
                        .ok_or_else(|| {
                            CallError::new("Parameter 'id' must be a list", 422, "VALIDATION_ERROR")
                        })?;
                    let users = users_fixture();
                    Ok(Value::Array(
                        ids.into_iter()
                            .map(|id| {
                                users
                                    .iter()
                                    .find(|user| user["id"] == id)
                                    .cloned()
                                    .unwrap_or(Value::Null)
                            })
                            .collect(),
                    ))
                }
            })),
        )
}

fn greeter_service() -> ServiceDescriptor {
    ServiceDescriptor::new("greeter")
        .with_action(
            ActionDescriptor::new("hello")
                .with_graphql(serde_json::from_value(json!({ "query": "hello: String!" })).unwrap())
                .with_handler(handler_fn(|_params, _ctx| async move {
                    Ok(json!("Hello Switchboard!"))
                })),
        )
        .with_action(
            ActionDescriptor::new("welcome")
                .with_graphql(
                    serde_json::from_value(json!({ "query": "welcome(name: String!): String!" }))
                        .unwrap(),
                )
                .with_handler(handler_fn(|params, _ctx| async move {
                    let name = params.get("name").and_then(Value::as_str).unwrap_or("?");
                    Ok(json!(format!("Hello {name}")))
                })),
        )
        .with_action(
            ActionDescriptor::new("danger")
                .with_graphql(serde_json::from_value(json!({ "query": "danger: String!" })).unwrap())
                .with_handler(handler_fn(|_params, _ctx| async move {
                    Err::<Value, _>(CallError::new("I've said it's a danger action!", 422, "DANGER"))
                })),
        )
        .with_action(
            ActionDescriptor::new("risky")
                .with_graphql(serde_json::from_value(json!({ "query": "risky: String" })).unwrap())
                .with_handler(handler_fn(|_params, _ctx| async move {
                    Err::<Value, _>(CallError::new("risky failed", 500, "RISKY"))
                })),
        )
}

struct Fixture {
    broker: Arc<LocalBroker>,
    gateway: Arc<GraphqlGateway>,
    resolve_calls: Arc<AtomicUsize>,
}

async fn fixture(config: GatewayConfig) -> Fixture {
    let broker = Arc::new(LocalBroker::new());
    let resolve_calls = Arc::new(AtomicUsize::new(0));

    broker.register(posts_service()).await.unwrap();
    broker
        .register(users_service(Arc::clone(&resolve_calls)))
        .await
        .unwrap();
    broker.register(greeter_service()).await.unwrap();

    let gateway = GraphqlGateway::new(
        config,
        broker.clone() as Arc<dyn ServiceRegistry>,
        broker.clone() as Arc<dyn Caller>,
        broker.bus(),
    )
    .unwrap();

    Fixture {
        broker,
        gateway,
        resolve_calls,
    }
}

async fn execute(gateway: &GraphqlGateway, query: &str) -> async_graphql::Response {
    gateway
        .execute(query, None, None, CallContext::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn aggregated_schema_contains_all_declarations() {
    let fx = fixture(GatewayConfig::default()).await;

    let compiled = fx.gateway.prepare_schema().await.unwrap();
    assert!(compiled.schema.is_some());
    assert!(compiled.sdl.contains("type Query"));
    assert!(compiled.sdl.contains("type Post"));
    assert!(compiled.sdl.contains("type User"));
    assert!(compiled.sdl.contains("posts(limit: Int)"));
    assert!(compiled.sdl.contains("hello: String!"));
}

#[tokio::test]
async fn query_resolves_through_remote_actions() {
    let fx = fixture(GatewayConfig::default()).await;

    let response = execute(&fx.gateway, "{ posts(limit: 2) { title author { name } } }").await;
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);

    let data = serde_json::to_value(&response.data).unwrap();
    assert_json_include!(
        actual: data,
        expected: json!({
            "posts": [
                { "title": "First post",  "author": { "name": "Quinton Loden" } },
                { "title": "Second post", "author": { "name": "Genaro Krueger" } }
            ]
        })
    );
}

#[tokio::test]
async fn variables_shape_downstream_params() {
    let fx = fixture(GatewayConfig::default()).await;

    let response = fx
        .gateway
        .execute(
            "query ($name: String!) { welcome(name: $name) }",
            None,
            Some(json!({ "name": "GraphQL" })),
            CallContext::new(),
        )
        .await
        .unwrap();

    let data = serde_json::to_value(&response.data).unwrap();
    assert_eq!(data["welcome"], "Hello GraphQL");
}

#[tokio::test]
async fn loader_coalesces_same_action_resolutions() {
    let mut config = GatewayConfig::default();
    config.loader_delay_ms = Some(10);
    let fx = fixture(config).await;

    let response = execute(&fx.gateway, "{ posts { title author { name } } }").await;
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);

    // Five author resolutions in one request collapse into one batched call.
    assert_eq!(fx.resolve_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn loader_preserves_list_key_order() {
    let fx = fixture(GatewayConfig::default()).await;

    let response = execute(&fx.gateway, "{ posts(limit: 4) { voters { name } } }").await;
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);

    let data = serde_json::to_value(&response.data).unwrap();
    let voters_of_fourth: Vec<&str> = data["posts"][3]["voters"]
        .as_array()
        .unwrap()
        .iter()
        .map(|user| user["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        voters_of_fourth,
        vec!["Bradford Knauer", "Genaro Krueger", "Nicholas Paris"]
    );
}

#[tokio::test]
async fn nested_direct_resolver_calls_back_into_other_service() {
    let fx = fixture(GatewayConfig::default()).await;

    let response = execute(&fx.gateway, "{ users(limit: 1) { name posts { title } } }").await;
    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);

    let data = serde_json::to_value(&response.data).unwrap();
    let titles: Vec<&str> = data["users"][0]["posts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|post| post["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Second post"]);
}

#[tokio::test]
async fn field_error_surfaces_alongside_partial_data() {
    let fx = fixture(GatewayConfig::default()).await;

    let response = execute(&fx.gateway, "{ danger }").await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "I've said it's a danger action!");
    assert!(!response.errors[0].path.is_empty());
}

#[tokio::test]
async fn sibling_fields_survive_one_nullable_field_failing() {
    let fx = fixture(GatewayConfig::default()).await;

    let response = execute(&fx.gateway, "{ hello risky }").await;

    assert_eq!(response.errors.len(), 1);
    assert_eq!(response.errors[0].message, "risky failed");
    let data = serde_json::to_value(&response.data).unwrap();
    assert_eq!(data["hello"], "Hello Switchboard!");
    assert_eq!(data["risky"], Value::Null);
}

#[tokio::test]
async fn duplicate_service_registrations_first_wins() {
    let fx = fixture(GatewayConfig::default()).await;

    let mut duplicate = posts_service();
    duplicate.actions[0].graphql = Some(
        serde_json::from_value::<ActionGraphql>(json!({ "query": "shadowPosts: [Post]" })).unwrap(),
    );
    fx.broker.register(duplicate).await.unwrap();

    let compiled = fx.gateway.prepare_schema().await.unwrap();
    assert!(compiled.sdl.contains("posts(limit: Int)"));
    assert!(!compiled.sdl.contains("shadowPosts"));
}

#[tokio::test]
async fn zero_declaration_registry_composes_base_type_defs_only() {
    let broker = Arc::new(LocalBroker::new());
    broker
        .register(ServiceDescriptor::new("metrics").with_action(
            ActionDescriptor::new("track").with_handler(handler_fn(|_p, _c| async move {
                Ok(Value::Null)
            })),
        ))
        .await
        .unwrap();

    let mut config = GatewayConfig::default();
    config.type_defs = vec!["scalar Timestamp".to_string()];

    let gateway = GraphqlGateway::new(
        config,
        broker.clone() as Arc<dyn ServiceRegistry>,
        broker.clone() as Arc<dyn Caller>,
        broker.bus(),
    )
    .unwrap();

    let compiled = gateway.prepare_schema().await.unwrap();
    assert!(compiled.schema.is_none());
    assert!(compiled.sdl.contains("scalar Timestamp"));
    assert!(!compiled.sdl.contains("type Query"));
    assert!(!compiled.sdl.contains("type Mutation"));
    assert!(!compiled.sdl.contains("type Subscription"));

    let err = gateway
        .execute("{ anything }", None, None, CallContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::InvalidRequest(_)));
}

struct CountingRegistry {
    inner: Arc<LocalBroker>,
    snapshots: AtomicUsize,
}

#[async_trait]
impl ServiceRegistry for CountingRegistry {
    async fn service_list(&self) -> Vec<ServiceDescriptor> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        self.inner.service_list().await
    }
}

#[tokio::test]
async fn concurrent_triggers_regenerate_exactly_once() {
    let broker = Arc::new(LocalBroker::new());
    broker.register(greeter_service()).await.unwrap();

    let registry = Arc::new(CountingRegistry {
        inner: Arc::clone(&broker),
        snapshots: AtomicUsize::new(0),
    });
    let gateway = GraphqlGateway::new(
        GatewayConfig::default(),
        registry.clone() as Arc<dyn ServiceRegistry>,
        broker.clone() as Arc<dyn Caller>,
        broker.bus(),
    )
    .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let gateway = Arc::clone(&gateway);
        tasks.push(tokio::spawn(async move {
            gateway.prepare_schema().await.map(|c| c.sdl.clone())
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert_eq!(registry.snapshots.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn regeneration_publishes_schema_updated_event() {
    let fx = fixture(GatewayConfig::default()).await;
    let mut rx = fx.broker.bus().subscribe();

    fx.gateway.prepare_schema().await.unwrap();

    let event = loop {
        let event = rx.recv().await.unwrap();
        if event.topic == topics::SCHEMA_UPDATED {
            break event;
        }
    };
    let schema_text = event.payload["schema"].as_str().unwrap();
    assert!(schema_text.contains("type Query"));
}

#[tokio::test]
async fn topology_change_triggers_lazy_regeneration() {
    let fx = fixture(GatewayConfig::default()).await;
    let _loop_handle = fx.gateway.spawn_event_loop();

    let before = fx.gateway.prepare_schema().await.unwrap();
    assert!(!before.sdl.contains("ping"));

    fx.broker
        .register(
            ServiceDescriptor::new("pinger").with_action(
                ActionDescriptor::new("ping")
                    .with_graphql(
                        serde_json::from_value::<ActionGraphql>(json!({ "query": "ping: String!" }))
                            .unwrap(),
                    )
                    .with_handler(handler_fn(|_p, _c| async move { Ok(json!("pong")) })),
            ),
        )
        .await
        .unwrap();

    // Give the event loop a moment to observe the topology change.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = fx.gateway.prepare_schema().await.unwrap();
    assert!(after.sdl.contains("ping: String!"));

    let response = execute(&fx.gateway, "{ ping }").await;
    let data = serde_json::to_value(&response.data).unwrap();
    assert_eq!(data["ping"], "pong");
}

#[tokio::test]
async fn subscription_stream_resolves_published_events() {
    let broker = Arc::new(LocalBroker::new());
    // A schema needs a Query root before a Subscription becomes executable.
    broker.register(greeter_service()).await.unwrap();
    broker
        .register(
            ServiceDescriptor::new("updates").with_action(
                ActionDescriptor::new("changed")
                    .with_graphql(
                        serde_json::from_value::<ActionGraphql>(json!({
                            "subscription": "updated: String!",
                            "tags": ["UPDATED"]
                        }))
                        .unwrap(),
                    )
                    .with_handler(handler_fn(|params, _ctx| async move {
                        Ok(params.get("payload").cloned().unwrap_or(Value::Null))
                    })),
            ),
        )
        .await
        .unwrap();

    let gateway = GraphqlGateway::new(
        GatewayConfig::default(),
        broker.clone() as Arc<dyn ServiceRegistry>,
        broker.clone() as Arc<dyn Caller>,
        broker.bus(),
    )
    .unwrap();
    let _loop_handle = gateway.spawn_event_loop();

    let stream = gateway
        .execute_stream("subscription { updated }", None, None, CallContext::new())
        .await
        .unwrap();
    let mut stream = Box::pin(stream);

    let publisher = {
        let bus = broker.bus();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            bus.publish(
                "graphql.publish",
                json!({ "tag": "UPDATED", "payload": "fresh" }),
            );
        })
    };

    let response = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("subscription timed out")
        .expect("stream ended unexpectedly");
    publisher.await.unwrap();

    assert!(response.errors.is_empty(), "errors: {:?}", response.errors);
    let data = serde_json::to_value(&response.data).unwrap();
    assert_eq!(data["updated"], "fresh");
}

#[tokio::test]
async fn generic_graphql_action_executes_queries() {
    let fx = fixture(GatewayConfig::default()).await;

    let action = fx.gateway.graphql_action().unwrap();
    fx.broker
        .register(ServiceDescriptor::new("api").with_action(action))
        .await
        .unwrap();

    let result = fx
        .broker
        .call(
            "api.graphql",
            json!({ "query": "{ hello }" }),
            &CallContext::new(),
        )
        .await
        .unwrap();

    assert_eq!(result["data"]["hello"], "Hello Switchboard!");
}
