//! Tests for the dispatch pipeline: matching, validation, permissions,
//! extension overrides, and error normalization.

mod common;

use common::{test_config, tracing_util};
use http::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use waypost::{
    ApiError, ArgSchema, DispatchContext, DispatchExtension, Dispatcher, HandlerArgs,
    HandlerResult, Request, RouteTable,
};

fn dispatcher_for(table: RouteTable) -> Dispatcher {
    tracing_util::init();
    Dispatcher::new(Arc::new(table), Arc::new(test_config()))
}

fn counting_handler(counter: &Arc<AtomicUsize>) -> HandlerArgs {
    let counter = Arc::clone(counter);
    HandlerArgs::new("GET", move |_req: &mut Request, _ctx: &DispatchContext<'_>| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "ok": true }).into())
    })
}

fn error_code(data: &Value) -> &str {
    data[0]["code"].as_str().unwrap_or_default()
}

#[test]
fn unmatched_path_yields_stable_no_route_code() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::GET, "/nowhere");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 404);
    assert_eq!(error_code(response.data()), "rest_no_route");
}

#[test]
fn method_mismatch_is_no_route_with_allow_header() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::PUT, "/content/v1/articles");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 404);
    assert_eq!(error_code(response.data()), "rest_no_route");
    let allow = response.header("Allow").expect("allow header present");
    assert!(allow.contains("GET"));
    assert!(allow.contains("POST"));
    assert!(!allow.contains("PUT"));
}

#[test]
fn url_params_are_extracted_and_win_over_query() {
    let mut table = RouteTable::new();
    table
        .register(
            None,
            "/articles/{id}",
            HandlerArgs::new("GET", |req: &mut Request, _ctx: &DispatchContext<'_>| {
                Ok(json!({ "id": req.get_param("id") }).into())
            }),
            false,
        )
        .expect("register");
    let dispatcher = dispatcher_for(table);

    let mut request = Request::new(Method::GET, "/articles/42");
    request.set_query_params([("id".to_string(), json!("query-id"))].into());
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.data()["id"], json!("42"));
    assert_eq!(request.matched_route(), Some("/articles/{id}"));
}

#[test]
fn declared_defaults_seed_missing_arguments() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::GET, "/content/v1/articles");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.data()["page"], json!(1));
    assert_eq!(response.data()["per_page"], json!(10));
    // Defaults land in the request's dedicated default-param slot.
    assert_eq!(request.default_params()["page"], json!(1));

    let mut request = Request::new(Method::GET, "/content/v1/articles");
    request.set_query_params([("page".to_string(), json!("3"))].into());
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.data()["page"], json!("3"));
}

#[test]
fn missing_required_params_are_reported_in_one_pass() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::POST, "/content/v1/articles");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response.data()), "rest_missing_callback_param");
    let params = response.data()[0]["data"]["params"]
        .as_array()
        .expect("params listed")
        .clone();
    assert!(params.contains(&json!("title")));
    assert!(params.contains(&json!("content")));
}

#[test]
fn supplied_required_params_pass_the_gate() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::POST, "/content/v1/articles");
    request.set_body_params(
        [
            ("title".to_string(), json!("Hello")),
            ("content".to_string(), json!("Body text")),
        ]
        .into(),
    );
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 201);
    assert_eq!(response.data()["title"], json!("Hello"));
}

#[test]
fn required_argument_satisfied_by_declared_default() {
    let mut table = RouteTable::new();
    table
        .register(
            None,
            "/widgets",
            HandlerArgs::new("GET", |req: &mut Request, _ctx: &DispatchContext<'_>| {
                Ok(json!({ "mode": req.get_param("mode") }).into())
            })
            .arg(
                "mode",
                ArgSchema::required().with_default(json!("summary")),
            ),
            false,
        )
        .expect("register");
    let dispatcher = dispatcher_for(table);
    let mut request = Request::new(Method::GET, "/widgets");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 200);
    assert_eq!(response.data()["mode"], json!("summary"));
}

#[test]
fn sanitized_empty_value_still_counts_as_supplied() {
    // Presence is decided by the key having been supplied, not by the
    // truthiness of the sanitized value.
    let mut table = RouteTable::new();
    table
        .register(
            None,
            "/widgets",
            HandlerArgs::new("GET", |req: &mut Request, _ctx: &DispatchContext<'_>| {
                Ok(json!({ "label": req.get_param("label") }).into())
            })
            .arg(
                "label",
                ArgSchema::required()
                    .sanitize_with(|_value, _req, _name| Ok(json!(""))),
            ),
            false,
        )
        .expect("register");
    let dispatcher = dispatcher_for(table);
    let mut request = Request::new(Method::GET, "/widgets");
    request.set_query_params([("label".to_string(), json!("   "))].into());
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 200);
    assert_eq!(response.data()["label"], json!(""));
}

#[test]
fn sanitizer_rewrites_the_stored_parameter() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::POST, "/content/v1/articles");
    request.set_body_params(
        [
            ("title".to_string(), json!("Hello")),
            ("content".to_string(), json!("Body")),
            ("slug".to_string(), json!("Hello World!")),
        ]
        .into(),
    );
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.data()["slug"], json!("hello-world"));
}

#[test]
fn failing_sanitizer_yields_invalid_param() {
    let mut table = RouteTable::new();
    table
        .register(
            None,
            "/widgets",
            HandlerArgs::new("GET", |_req: &mut Request, _ctx: &DispatchContext<'_>| {
                Ok(json!(null).into())
            })
            .arg(
                "color",
                ArgSchema::optional().sanitize_with(|_value, _req, name| {
                    Err(ApiError::new(
                        "rest_invalid_param",
                        format!("{name} is not a color"),
                    ))
                }),
            ),
            false,
        )
        .expect("register");
    let dispatcher = dispatcher_for(table);
    let mut request = Request::new(Method::GET, "/widgets");
    request.set_query_params([("color".to_string(), json!("plaid"))].into());
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response.data()), "rest_invalid_param");
    assert!(response.data()[0]["data"]["params"]["color"]
        .as_str()
        .expect("per-param detail")
        .contains("color"));
}

#[test]
fn failing_validation_yields_invalid_param() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::GET, "/content/v1/articles/not-a-number");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 400);
    assert_eq!(error_code(response.data()), "rest_invalid_param");
    assert!(response.data()[0]["data"]["params"]
        .get("id")
        .is_some());
}

#[test]
fn permission_false_yields_401_then_403_and_skips_callback() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut table = RouteTable::new();
    let handler_counter = Arc::clone(&counter);
    table
        .register(
            None,
            "/secret",
            HandlerArgs::new("GET", move |_req: &mut Request, _ctx: &DispatchContext<'_>| {
                handler_counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({ "secret": true }).into())
            })
            .permission(|_req: &Request| Ok(false)),
            false,
        )
        .expect("register");
    let dispatcher = dispatcher_for(table);

    let mut request = Request::new(Method::GET, "/secret");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 401);
    assert_eq!(error_code(response.data()), "rest_forbidden");

    let mut request = Request::new(Method::GET, "/secret");
    request.set_authenticated(true);
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 403);

    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn permission_error_value_passes_through() {
    let mut table = RouteTable::new();
    table
        .register(
            None,
            "/secret",
            HandlerArgs::new("GET", |_req: &mut Request, _ctx: &DispatchContext<'_>| {
                Ok(json!(null).into())
            })
            .permission(|_req: &Request| {
                Err(ApiError::new("rest_banned", "Account suspended.").with_status(403))
            }),
            false,
        )
        .expect("register");
    let dispatcher = dispatcher_for(table);
    let mut request = Request::new(Method::GET, "/secret");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 403);
    assert_eq!(error_code(response.data()), "rest_banned");
}

#[test]
fn handler_without_callback_is_a_500_registration_bug() {
    let mut table = RouteTable::new();
    table
        .register(None, "/broken", HandlerArgs::without_callback("GET"), false)
        .expect("register");
    let dispatcher = dispatcher_for(table);
    let mut request = Request::new(Method::GET, "/broken");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 500);
    assert_eq!(error_code(response.data()), "rest_invalid_handler");
}

#[test]
fn dispatch_extension_can_override_the_outcome() {
    struct CompatShim {
        hits: Arc<AtomicUsize>,
    }
    impl DispatchExtension for CompatShim {
        fn override_dispatch(
            &self,
            request: &mut Request,
            _ctx: &DispatchContext<'_>,
        ) -> Option<HandlerResult> {
            if request.path() == "/legacy" {
                self.hits.fetch_add(1, Ordering::SeqCst);
                Some(Ok(json!({ "legacy": true }).into()))
            } else {
                None
            }
        }
    }

    let counter = Arc::new(AtomicUsize::new(0));
    let mut table = RouteTable::new();
    table
        .register(None, "/legacy", counting_handler(&counter), false)
        .expect("register legacy");
    table
        .register(None, "/modern", counting_handler(&counter), false)
        .expect("register modern");

    let hits = Arc::new(AtomicUsize::new(0));
    let mut dispatcher = dispatcher_for(table);
    dispatcher.add_extension(Arc::new(CompatShim {
        hits: Arc::clone(&hits),
    }));

    let mut request = Request::new(Method::GET, "/legacy");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.data()["legacy"], json!(true));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    let mut request = Request::new(Method::GET, "/modern");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.data()["ok"], json!(true));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn first_match_is_final_even_when_it_errors() {
    let mut table = RouteTable::new();
    table
        .register(
            None,
            "/gone/{slug}",
            HandlerArgs::new("GET", |_req: &mut Request, _ctx: &DispatchContext<'_>| {
                Err(ApiError::new("rest_gone", "This resource left.").with_status(410))
            }),
            false,
        )
        .expect("register erroring route");
    table
        .register(
            None,
            "/gone/archive",
            HandlerArgs::new("GET", |_req: &mut Request, _ctx: &DispatchContext<'_>| {
                Ok(json!({ "archived": true }).into())
            }),
            false,
        )
        .expect("register later route");
    let dispatcher = dispatcher_for(table);
    let mut request = Request::new(Method::GET, "/gone/archive");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.status(), 410);
    assert_eq!(error_code(response.data()), "rest_gone");
}

#[test]
fn response_is_stamped_with_matched_route_and_handler() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::GET, "/content/v1/articles/7");
    let response = dispatcher.dispatch(&mut request);
    assert_eq!(response.matched_route(), Some("/content/v1/articles/{id}"));
    let handler = response.matched_handler().expect("handler stamped");
    assert!(handler.methods.contains(&Method::GET));
    assert!(handler.args.contains_key("id"));
}

#[test]
fn error_responses_keep_the_wire_list_shape() {
    let dispatcher = dispatcher_for(common::content_routes());
    let mut request = Request::new(Method::GET, "/missing");
    let response = dispatcher.dispatch(&mut request);
    let list = response.data().as_array().expect("list shape");
    assert!(!list.is_empty());
    for entry in list {
        assert!(!entry["code"].as_str().unwrap_or_default().is_empty());
        assert!(entry.get("message").is_some());
        assert!(entry.get("data").is_some());
    }
}
