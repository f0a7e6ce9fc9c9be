use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::extensions::DispatchExtension;
use crate::request::{Params, Request};
use crate::response::Response;
use crate::routes::{Handler, Route, RouteTable};
use crate::serializable::HandlerResult;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Read-only context handed to callbacks and dispatch extensions.
///
/// Exposes the route table and configuration explicitly, so handlers that
/// introspect the API (the discovery index, namespace indexes) need no
/// ambient global registry.
pub struct DispatchContext<'a> {
    pub routes: &'a RouteTable,
    pub config: &'a ApiConfig,
}

/// Matches an inbound request to a route and handler, runs the validation,
/// permission, and execution pipeline, and normalizes any outcome into a
/// [`Response`].
///
/// The table is scanned in registration order and the first route and
/// method combination that matches wins; no specificity ranking is applied,
/// so callers register more specific patterns first. Once a combination
/// matches, the outcome is final even when the handler itself errors.
pub struct Dispatcher {
    routes: Arc<RouteTable>,
    config: Arc<ApiConfig>,
    extensions: Vec<Arc<dyn DispatchExtension>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(routes: Arc<RouteTable>, config: Arc<ApiConfig>) -> Self {
        Self {
            routes,
            config,
            extensions: Vec::new(),
        }
    }

    /// Add a dispatch extension. Extensions are consulted in insertion order.
    pub fn add_extension(&mut self, extension: Arc<dyn DispatchExtension>) {
        self.extensions.push(extension);
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Match and execute. Always produces a response; failures of every
    /// kind come back as error responses, never as panics or raw faults.
    pub fn dispatch(&self, request: &mut Request) -> Response {
        debug!(
            method = %request.method(),
            path = %request.path(),
            "Route match attempt"
        );

        let snapshot = self.routes.routes();
        for route in &snapshot {
            for handler in &route.handlers {
                if !handler.allows(request.method()) {
                    continue;
                }
                let Some(captures) = route.pattern.matches(request.path()) else {
                    continue;
                };
                info!(
                    method = %request.method(),
                    path = %request.path(),
                    route = %route.pattern.raw(),
                    "Route matched"
                );
                return self.respond(request, route, handler, captures);
            }
        }

        warn!(
            method = %request.method(),
            path = %request.path(),
            "No route matched"
        );
        let mut response = Response::from(ApiError::no_route());
        if let Some(allow) = allowed_methods(request.path(), &snapshot) {
            response.set_header("Allow", allow);
        }
        response
    }

    /// Run the pipeline for a matched route and handler and stamp the
    /// response with both, for self links and schema introspection later.
    fn respond(
        &self,
        request: &mut Request,
        route: &Route,
        handler: &Arc<Handler>,
        captures: HashMap<String, String>,
    ) -> Response {
        let mut response = if handler.callback.is_none() {
            // Registered but uncallable: a deployment bug, not a client error.
            error!(route = %route.pattern.raw(), "Matched handler has no callback");
            Response::from(ApiError::invalid_handler())
        } else {
            let url_params: Params = captures
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect();
            request.set_url_params(url_params);
            request.set_attributes(Arc::clone(handler));
            request.set_matched_route(route.pattern.raw());

            match self.run_pipeline(request, handler) {
                Ok(outcome) => outcome.into_response(),
                Err(err) => {
                    debug!(code = %err.code(), "Dispatch pipeline error");
                    Response::from(err)
                }
            }
        };

        response.set_matched_route(route.pattern.raw());
        response.set_matched_handler(Arc::clone(handler));
        debug!(
            status = response.status(),
            route = %route.pattern.raw(),
            "Dispatch complete"
        );
        response
    }

    /// Sanitize, seed defaults, gate on required params and validation,
    /// check permissions, then execute the callback (unless an extension
    /// overrides the outcome first).
    fn run_pipeline(&self, request: &mut Request, handler: &Arc<Handler>) -> HandlerResult {
        request.sanitize_params()?;

        let mut defaults = Params::new();
        for (name, schema) in &handler.args {
            if let Some(default) = &schema.default {
                if !request.has_param(name) {
                    defaults.insert(name.clone(), default.clone());
                }
            }
        }
        request.set_default_params(defaults);

        request.has_valid_params()?;

        if let Some(permission) = &handler.permission {
            match permission(request) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        path = %request.path(),
                        authenticated = request.authenticated(),
                        "Permission check refused request"
                    );
                    return Err(ApiError::forbidden(request.authenticated()));
                }
                Err(err) => return Err(err),
            }
        }

        let ctx = DispatchContext {
            routes: &self.routes,
            config: &self.config,
        };
        for extension in &self.extensions {
            if let Some(result) = extension.override_dispatch(request, &ctx) {
                debug!(path = %request.path(), "Dispatch outcome overridden by extension");
                return result;
            }
        }

        let callback = handler.callback.as_ref().ok_or_else(ApiError::invalid_handler)?;
        callback(request, &ctx)
    }
}

/// Union of methods accepted by every route whose pattern matches the path.
/// Drives the `Allow` header on method-mismatch 404s.
fn allowed_methods(path: &str, routes: &[Route]) -> Option<String> {
    let mut methods: Vec<String> = Vec::new();
    for route in routes {
        if route.pattern.matches(path).is_none() {
            continue;
        }
        for handler in &route.handlers {
            for method in &handler.methods {
                let name = method.to_string();
                if !methods.contains(&name) {
                    methods.push(name);
                }
            }
        }
    }
    if methods.is_empty() {
        None
    } else {
        methods.sort();
        Some(methods.join(", "))
    }
}
