//! Executable schema construction.
//!
//! Parses the composed schema document and registers every declared type with
//! the execution engine's dynamic API, attaching synthesized resolvers by
//! type+field. Fields without a synthesized resolver get the default property
//! resolver: the field is read off the parent object value, with `__typename`
//! attribution for abstract types.
//!
//! A document without a `Query` root composes and prints fine but has nothing
//! to execute; compilation then yields no engine schema rather than failing.

use std::sync::Arc;

use async_graphql::dynamic::{
    Enum, EnumItem, Field, FieldFuture, InputObject, InputValue, Interface, InterfaceField,
    Object, ResolverContext, Scalar, Schema, SchemaBuilder, Subscription, SubscriptionField,
    SubscriptionFieldFuture, TypeRef, Union,
};
use async_graphql::Value as GqlValue;
use async_graphql_parser::parse_schema;
use async_graphql_parser::types as ast;
use futures_util::StreamExt;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::context::GraphqlContext;
use crate::error::GatewayError;
use crate::resolvers::{FieldResolver, ResolverMap};
use crate::value::{gql_to_field_value, gql_to_json, json_to_field_value};

/// Compiles the schema document against the resolver map.
///
/// Returns `None` when the document declares no `Query` root (nothing is
/// executable, which is legal for a registry with no declaring actions).
///
/// # Errors
///
/// Returns [`GatewayError::SchemaCompilation`] on schema-language syntax
/// errors, conflicting type definitions, unresolved type references, or a
/// subscription field with no backing resolver.
pub fn compile(sdl: &str, resolvers: &ResolverMap) -> Result<Option<Schema>, GatewayError> {
    if sdl.trim().is_empty() {
        return Ok(None);
    }

    let document = parse_schema(sdl).map_err(|err| GatewayError::SchemaCompilation {
        message: err.to_string(),
    })?;

    let mut has_query = false;
    let mut has_mutation = false;
    let mut has_subscription = false;
    for definition in &document.definitions {
        if let ast::TypeSystemDefinition::Type(ty) = definition {
            match ty.node.name.node.as_str() {
                "Query" => has_query = true,
                "Mutation" => has_mutation = true,
                "Subscription" => has_subscription = true,
                _ => {}
            }
        }
    }
    if !has_query {
        debug!("composed document declares no Query root, skipping executable schema");
        return Ok(None);
    }

    let mut builder = Schema::build(
        "Query",
        has_mutation.then_some("Mutation"),
        has_subscription.then_some("Subscription"),
    );

    for definition in document.definitions {
        match definition {
            // The composed document never carries schema definitions, and
            // directive definitions are passthrough text.
            ast::TypeSystemDefinition::Schema(_) | ast::TypeSystemDefinition::Directive(_) => {}
            ast::TypeSystemDefinition::Type(ty) => {
                builder = register_type(builder, ty.node, resolvers)?;
            }
        }
    }

    builder
        .finish()
        .map(Some)
        .map_err(|err| GatewayError::SchemaCompilation {
            message: err.to_string(),
        })
}

fn register_type(
    builder: SchemaBuilder,
    ty: ast::TypeDefinition,
    resolvers: &ResolverMap,
) -> Result<SchemaBuilder, GatewayError> {
    let name = ty.name.node.to_string();
    let description = ty.description.map(|d| d.node);

    match ty.kind {
        ast::TypeKind::Scalar => {
            let mut scalar = Scalar::new(name);
            if let Some(desc) = description {
                scalar = scalar.description(desc);
            }
            Ok(builder.register(scalar))
        }
        ast::TypeKind::Object(object) if name == "Subscription" => {
            Ok(builder.register(build_subscription(object, resolvers)?))
        }
        ast::TypeKind::Object(object) => {
            let mut obj = Object::new(name.clone());
            if let Some(desc) = description {
                obj = obj.description(desc);
            }
            for interface in object.implements {
                obj = obj.implement(interface.node.to_string());
            }
            for field in object.fields {
                obj = obj.field(build_field(&name, field.node, resolvers));
            }
            Ok(builder.register(obj))
        }
        ast::TypeKind::Interface(interface) => {
            let mut iface = Interface::new(name);
            if let Some(desc) = description {
                iface = iface.description(desc);
            }
            for implemented in interface.implements {
                iface = iface.implement(implemented.node.to_string());
            }
            for field in interface.fields {
                let definition = field.node;
                let mut ifield = InterfaceField::new(
                    definition.name.node.to_string(),
                    type_ref(&definition.ty.node),
                );
                if let Some(desc) = definition.description {
                    ifield = ifield.description(desc.node);
                }
                for argument in definition.arguments {
                    ifield = ifield.argument(build_input_value(argument.node));
                }
                iface = iface.field(ifield);
            }
            Ok(builder.register(iface))
        }
        ast::TypeKind::Union(union_type) => {
            let mut union = Union::new(name);
            if let Some(desc) = description {
                union = union.description(desc);
            }
            for member in union_type.members {
                union = union.possible_type(member.node.to_string());
            }
            Ok(builder.register(union))
        }
        ast::TypeKind::Enum(enum_type) => {
            let mut enumeration = Enum::new(name);
            if let Some(desc) = description {
                enumeration = enumeration.description(desc);
            }
            for value in enum_type.values {
                let definition = value.node;
                let mut item = EnumItem::new(definition.value.node.to_string());
                if let Some(desc) = definition.description {
                    item = item.description(desc.node);
                }
                enumeration = enumeration.item(item);
            }
            Ok(builder.register(enumeration))
        }
        ast::TypeKind::InputObject(input) => {
            let mut obj = InputObject::new(name);
            if let Some(desc) = description {
                obj = obj.description(desc);
            }
            for field in input.fields {
                obj = obj.field(build_input_value(field.node));
            }
            Ok(builder.register(obj))
        }
    }
}

fn build_field(type_name: &str, definition: ast::FieldDefinition, resolvers: &ResolverMap) -> Field {
    let field_name = definition.name.node.to_string();
    let tr = type_ref(&definition.ty.node);

    let mut field = match resolvers.get(type_name, &field_name) {
        Some(resolver) => resolver_field(field_name, tr, Arc::clone(resolver)),
        None => property_field(field_name, tr),
    };

    if let Some(desc) = definition.description {
        field = field.description(desc.node);
    }
    for argument in definition.arguments {
        field = field.argument(build_input_value(argument.node));
    }
    field
}

/// Field backed by a synthesized resolver.
fn resolver_field(name: String, tr: TypeRef, resolver: Arc<FieldResolver>) -> Field {
    Field::new(name, tr, move |ctx| {
        let resolver = Arc::clone(&resolver);
        FieldFuture::new(async move {
            match resolver.as_ref() {
                FieldResolver::Constant(value) => Ok(json_to_field_value(value.clone())),
                FieldResolver::Action(action) => {
                    let gql_ctx = ctx.data::<GraphqlContext>()?;
                    let root = ctx.parent_value.as_value().map(gql_to_json);
                    let args = args_to_json(&ctx);
                    let result = action
                        .resolve(root.as_ref(), args, gql_ctx)
                        .await
                        .map_err(GatewayError::into_field_error)?;
                    Ok(json_to_field_value(result))
                }
                FieldResolver::Subscription(_) => Err(async_graphql::Error::new(
                    "subscription resolver bound to an output field",
                )),
            }
        })
    })
}

/// Default resolver: read the field off the parent object value.
fn property_field(name: String, tr: TypeRef) -> Field {
    let key = name.clone();
    Field::new(name, tr, move |ctx| {
        let key = key.clone();
        FieldFuture::new(async move {
            let Some(GqlValue::Object(parent)) = ctx.parent_value.as_value() else {
                return Ok(None);
            };
            Ok(parent
                .get(key.as_str())
                .cloned()
                .and_then(gql_to_field_value))
        })
    })
}

fn build_subscription(
    object: ast::ObjectType,
    resolvers: &ResolverMap,
) -> Result<Subscription, GatewayError> {
    let mut subscription = Subscription::new("Subscription");

    for field in object.fields {
        let definition = field.node;
        let field_name = definition.name.node.to_string();
        let tr = type_ref(&definition.ty.node);

        let Some(resolver) = resolvers.get("Subscription", &field_name) else {
            return Err(GatewayError::SchemaCompilation {
                message: format!("no resolver registered for subscription field '{field_name}'"),
            });
        };
        let FieldResolver::Subscription(sub_resolver) = resolver.as_ref() else {
            return Err(GatewayError::SchemaCompilation {
                message: format!("field '{field_name}' is not backed by a subscription resolver"),
            });
        };

        let sub_resolver = Arc::clone(sub_resolver);
        let mut sfield = SubscriptionField::new(field_name, tr, move |ctx| {
            let resolver = Arc::clone(&sub_resolver);
            SubscriptionFieldFuture::new(async move {
                let gql_ctx = ctx.data::<GraphqlContext>()?;
                let args = args_to_json(&ctx);
                let stream = resolver.stream(args, gql_ctx.call_ctx.clone());
                Ok(stream.map(|item| {
                    item.map(crate::value::json_to_gql)
                        .map_err(GatewayError::into_field_error)
                }))
            })
        });

        if let Some(desc) = definition.description {
            sfield = sfield.description(desc.node);
        }
        for argument in definition.arguments {
            sfield = sfield.argument(build_input_value(argument.node));
        }
        subscription = subscription.field(sfield);
    }

    Ok(subscription)
}

fn build_input_value(definition: ast::InputValueDefinition) -> InputValue {
    let mut input = InputValue::new(
        definition.name.node.to_string(),
        type_ref(&definition.ty.node),
    );
    if let Some(desc) = definition.description {
        input = input.description(desc.node);
    }
    if let Some(default) = definition.default_value {
        input = input.default_value(default.node);
    }
    input
}

fn type_ref(ty: &ast::Type) -> TypeRef {
    let base = match &ty.base {
        ast::BaseType::Named(name) => TypeRef::named(name.to_string()),
        ast::BaseType::List(inner) => TypeRef::List(Box::new(type_ref(inner))),
    };
    if ty.nullable {
        base
    } else {
        TypeRef::NonNull(Box::new(base))
    }
}

fn args_to_json(ctx: &ResolverContext<'_>) -> Map<String, JsonValue> {
    ctx.args
        .as_index_map()
        .iter()
        .map(|(name, value)| (name.to_string(), gql_to_json(value)))
        .collect()
}
