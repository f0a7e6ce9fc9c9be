//! Shared fixtures: a small article-and-user API in the shape a content
//! platform plugin would register, plus helpers to build servers around it.

#![allow(dead_code)]

use serde_json::{json, Map, Value};
use waypost::{
    ApiConfig, ApiError, ApiServer, ArgSchema, DispatchContext, HandlerArgs, HandlerOutcome,
    HandlerResult, Request, Response, RouteSpec, RouteTable,
};

pub mod tracing_util {
    use std::sync::Once;

    static TRACING_INIT: Once = Once::new();

    /// Install a per-process test subscriber honoring `RUST_LOG`.
    pub fn init() {
        TRACING_INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
                )
                .with_test_writer()
                .try_init();
        });
    }
}

pub fn test_config() -> ApiConfig {
    ApiConfig {
        site_name: "Fixture Gazette".to_string(),
        site_description: "Integration fixture site".to_string(),
        site_url: "http://example.test".to_string(),
        api_root: "http://example.test/api".to_string(),
        charset: "UTF-8".to_string(),
        enabled: true,
        jsonp_enabled: true,
    }
}

/// Route table for a minimal articles-and-users surface.
pub fn content_routes() -> RouteTable {
    let mut table = RouteTable::new();
    table
        .register(
            Some("content/v1"),
            "/articles",
            RouteSpec::new(vec![
                HandlerArgs::new("GET, HEAD", list_articles)
                    .arg("page", ArgSchema::optional().with_default(json!(1)))
                    .arg("per_page", ArgSchema::optional().with_default(json!(10))),
                HandlerArgs::new("POST", create_article)
                    .arg("title", ArgSchema::required())
                    .arg("content", ArgSchema::required())
                    .arg(
                        "slug",
                        ArgSchema::optional().sanitize_with(|value, _req, _name| {
                            Ok(json!(slugify(value.as_str().unwrap_or_default())))
                        }),
                    ),
            ]),
            false,
        )
        .expect("register /articles");
    table
        .register(
            Some("content/v1"),
            "/articles/{id}",
            RouteSpec::new(vec![
                HandlerArgs::new("GET", get_article).arg(
                    "id",
                    ArgSchema::required().validate_with(|value, _req, name| {
                        let numeric = value
                            .as_str()
                            .map(|s| s.chars().all(|c| c.is_ascii_digit()) && !s.is_empty())
                            .unwrap_or(false);
                        if numeric {
                            Ok(())
                        } else {
                            Err(ApiError::new(
                                "rest_invalid_param",
                                format!("{name} must be numeric"),
                            ))
                        }
                    }),
                ),
                HandlerArgs::new("DELETE", delete_article)
                    .permission(|req: &Request| Ok(req.authenticated())),
            ]),
            false,
        )
        .expect("register /articles/{id}");
    table
        .register(
            Some("content/v1"),
            "/users/{id}",
            HandlerArgs::new("GET", get_user),
            false,
        )
        .expect("register /users/{id}");
    table
}

pub fn server_with(table: RouteTable) -> ApiServer {
    tracing_util::init();
    ApiServer::new(table, test_config()).expect("server builds")
}

pub fn content_server() -> ApiServer {
    server_with(content_routes())
}

fn slugify(raw: &str) -> String {
    raw.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

fn list_articles(request: &mut Request, _ctx: &DispatchContext<'_>) -> HandlerResult {
    Ok(json!({
        "articles": [ { "id": 1 }, { "id": 2 } ],
        "page": request.get_param("page"),
        "per_page": request.get_param("per_page"),
    })
    .into())
}

fn create_article(request: &mut Request, ctx: &DispatchContext<'_>) -> HandlerResult {
    let title = request.get_param("title").cloned().unwrap_or(Value::Null);
    let slug = request.get_param("slug").cloned().unwrap_or(Value::Null);
    let mut response = Response::with_status(json!({ "id": 3, "title": title, "slug": slug }), 201);
    response.add_link("self", ctx.config.route_url("/content/v1/articles/3"));
    Ok(HandlerOutcome::Response(response))
}

fn get_article(request: &mut Request, ctx: &DispatchContext<'_>) -> HandlerResult {
    let id = request
        .get_param("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut response = Response::new(json!({
        "id": id,
        "title": format!("Article {id}"),
        "context": request.get_param("context"),
    }));
    response.add_link(
        "self",
        ctx.config.route_url(&format!("/content/v1/articles/{id}")),
    );
    let mut embeddable = Map::new();
    embeddable.insert("embeddable".to_string(), json!(true));
    response.add_link_with(
        "author",
        ctx.config.route_url("/content/v1/users/9"),
        embeddable,
    );
    Ok(HandlerOutcome::Response(response))
}

fn delete_article(_request: &mut Request, _ctx: &DispatchContext<'_>) -> HandlerResult {
    Ok(json!({ "deleted": true }).into())
}

fn get_user(request: &mut Request, _ctx: &DispatchContext<'_>) -> HandlerResult {
    let id = request
        .get_param("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut response = Response::new(json!({
        "id": id,
        "name": "Fixture Author",
        "context": request.get_param("context"),
    }));
    response.add_link(
        "self",
        format!("http://example.test/api/content/v1/users/{id}"),
    );
    Ok(HandlerOutcome::Response(response))
}
