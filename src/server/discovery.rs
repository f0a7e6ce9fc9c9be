//! Discovery endpoints.
//!
//! `GET /` answers with the site identity plus every visible route's
//! metadata; each namespace gets its own index route when its first route
//! is registered. Both handlers are ordinary callbacks reading the route
//! table through the dispatch context.

use crate::dispatcher::DispatchContext;
use crate::error::ApiError;
use crate::request::Request;
use crate::response::Response;
use crate::routes::Route;
use crate::serializable::{HandlerOutcome, HandlerResult};
use serde_json::{json, Map, Value};

/// `GET /`: site name, description, url, namespaces, and route metadata
/// filtered to handlers marked visible in the index.
pub fn index(_request: &mut Request, ctx: &DispatchContext<'_>) -> HandlerResult {
    let mut data = Map::new();
    data.insert("name".to_string(), json!(ctx.config.site_name));
    data.insert(
        "description".to_string(),
        json!(ctx.config.site_description),
    );
    data.insert("url".to_string(), json!(ctx.config.site_url));
    data.insert("namespaces".to_string(), json!(ctx.routes.namespaces()));
    // Authentication methods are contributed by the pluggable authenticator
    // layer; the core itself has none to advertise.
    data.insert("authentication".to_string(), json!({}));
    data.insert("routes".to_string(), routes_data(ctx, None));

    let mut response = Response::new(Value::Object(data));
    response.add_link("self", ctx.config.route_url("/"));
    Ok(HandlerOutcome::Response(response))
}

/// `GET /{namespace}`: the routes registered under one namespace.
pub fn namespace_index(request: &mut Request, ctx: &DispatchContext<'_>) -> HandlerResult {
    let namespace = request
        .get_param("namespace")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default();
    if !ctx
        .routes
        .namespaces()
        .iter()
        .any(|known| known == &namespace)
    {
        return Err(ApiError::new(
            "rest_no_namespace",
            "The specified namespace could not be found.",
        )
        .with_status(404));
    }

    let mut data = Map::new();
    data.insert("namespace".to_string(), json!(namespace));
    data.insert(
        "routes".to_string(),
        routes_data(ctx, Some(namespace.as_str())),
    );

    let mut response = Response::new(Value::Object(data));
    response.add_link("self", ctx.config.route_url(&format!("/{namespace}")));
    response.add_link("up", ctx.config.route_url("/"));
    Ok(HandlerOutcome::Response(response))
}

/// Route metadata keyed by pattern, optionally filtered to one namespace.
fn routes_data(ctx: &DispatchContext<'_>, namespace: Option<&str>) -> Value {
    let mut out = Map::new();
    for route in ctx.routes.routes() {
        if let Some(wanted) = namespace {
            if route.namespace.as_deref() != Some(wanted) {
                continue;
            }
        }
        if let Some(entry) = route_data(ctx, &route) {
            out.insert(route.pattern.raw().to_string(), entry);
        }
    }
    Value::Object(out)
}

/// Metadata for one route, or `None` when every handler is index-hidden.
fn route_data(ctx: &DispatchContext<'_>, route: &Route) -> Option<Value> {
    let visible: Vec<_> = route
        .handlers
        .iter()
        .filter(|handler| handler.show_in_index)
        .collect();
    if visible.is_empty() {
        return None;
    }

    let mut methods: Vec<String> = Vec::new();
    let mut endpoints = Vec::with_capacity(visible.len());
    for handler in &visible {
        let mut endpoint_methods: Vec<String> =
            handler.methods.iter().map(|method| method.to_string()).collect();
        endpoint_methods.sort();
        for method in &endpoint_methods {
            if !methods.contains(method) {
                methods.push(method.clone());
            }
        }

        let mut args = Map::new();
        for (name, schema) in &handler.args {
            let mut arg = Map::new();
            arg.insert("required".to_string(), json!(schema.required));
            if let Some(default) = &schema.default {
                arg.insert("default".to_string(), default.clone());
            }
            if let Some(description) = &schema.description {
                arg.insert("description".to_string(), json!(description));
            }
            args.insert(name.clone(), Value::Object(arg));
        }
        endpoints.push(json!({ "methods": endpoint_methods, "args": args }));
    }
    methods.sort();

    let mut entry = Map::new();
    if let Some(ns) = &route.namespace {
        entry.insert("namespace".to_string(), json!(ns));
    }
    entry.insert("methods".to_string(), json!(methods));
    entry.insert("endpoints".to_string(), Value::Array(endpoints));
    if let Some(schema) = &route.schema {
        entry.insert("schema".to_string(), schema());
    }
    entry.insert(
        "_links".to_string(),
        json!({ "self": [ { "href": ctx.config.route_url(route.pattern.raw()) } ] }),
    );
    Some(Value::Object(entry))
}
