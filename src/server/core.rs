use super::request::RawRequest;
use crate::auth::{AuthCheck, Authenticator, OpenAccess};
use crate::config::ApiConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ApiError;
use crate::extensions::ServerExtension;
use crate::ids::RequestId;
use crate::request::{Params, Request};
use crate::response::{Link, Response};
use crate::routes::{ArgSchema, HandlerArgs, RouteSpec, RouteTable};
use anyhow::Result;
use http::Method;
use regex::Regex;
use serde_json::{json, Map, Value};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Maximum inline response headers before heap allocation.
/// API responses carry a small, predictable header set.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the serve path.
///
/// Header names use `Arc<str>`: the common names are fixed strings known at
/// startup, and cloning them is an O(1) refcount bump. Values stay `String`
/// as per-response data.
pub type WireHeaders = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// The fully assembled wire outcome of one served call.
///
/// `body: None` means nothing further should be written: either the call
/// was a HEAD request or a pre-serve extension reported the response as
/// already sent.
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub headers: WireHeaders,
    pub body: Option<String>,
}

impl WireResponse {
    #[must_use]
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: WireHeaders::new(),
            body: None,
        }
    }

    /// Add or update a header (case-insensitive name comparison).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value.into()));
    }

    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// The server front-end: owns the process-wide request lifecycle.
///
/// Construction registers the discovery index at `/`, wires the dispatcher
/// to the finished route table, and freezes both behind `Arc`s; from then
/// on the server only reads shared state, so one instance can serve
/// concurrent calls. Per call it performs content negotiation, delegates
/// authentication, dispatches, applies enveloping and link embedding, and
/// serializes the outcome.
pub struct ApiServer {
    routes: Arc<RouteTable>,
    config: Arc<ApiConfig>,
    dispatcher: Dispatcher,
    authenticator: Arc<dyn Authenticator>,
    extensions: Vec<Arc<dyn ServerExtension>>,
    jsonp_callback_re: Regex,
}

impl ApiServer {
    /// Take ownership of a fully registered route table and configuration.
    ///
    /// Fails only on registration problems with the discovery route, which
    /// indicates a pattern collision introduced by the embedder.
    pub fn new(mut routes: RouteTable, config: ApiConfig) -> Result<Self> {
        routes.register(
            None,
            "/",
            RouteSpec::from(
                HandlerArgs::new("GET", super::discovery::index)
                    .arg("context", ArgSchema::optional().with_default(json!("view"))),
            ),
            false,
        )?;

        let routes = Arc::new(routes);
        let config = Arc::new(config);
        let dispatcher = Dispatcher::new(Arc::clone(&routes), Arc::clone(&config));
        // Compiled once; JSONP names are restricted to word chars and dots.
        let jsonp_callback_re = Regex::new(r"^[\w.]+$")?;

        info!(
            routes = routes.len(),
            namespaces = routes.namespaces().len(),
            api_root = %config.api_root,
            "API server initialized"
        );

        Ok(Self {
            routes,
            config,
            dispatcher,
            authenticator: Arc::new(OpenAccess),
            extensions: Vec::new(),
            jsonp_callback_re,
        })
    }

    pub fn set_authenticator(&mut self, authenticator: Arc<dyn Authenticator>) {
        self.authenticator = authenticator;
    }

    pub fn add_extension(&mut self, extension: Arc<dyn ServerExtension>) {
        self.extensions.push(extension);
    }

    pub fn add_dispatch_extension(
        &mut self,
        extension: Arc<dyn crate::extensions::DispatchExtension>,
    ) {
        self.dispatcher.add_extension(extension);
    }

    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Dispatch without the serving envelope. Useful for internal calls
    /// and tests that want the structured [`Response`] rather than wire text.
    pub fn dispatch(&self, request: &mut Request) -> Response {
        self.dispatcher.dispatch(request)
    }

    /// Serve one inbound call end to end.
    pub fn serve(&self, raw: RawRequest) -> WireResponse {
        let request_id = RequestId::from_header_or_new(raw.header("x-request-id"));
        let jsonp_callback = raw.query.get("_jsonp").cloned();
        let jsonp_active = jsonp_callback.is_some() && self.config.jsonp_enabled;

        // Content negotiation happens first so even early failures carry the
        // right type. JSONP historically enables content sniffing attacks,
        // hence the unconditional nosniff.
        let content_type = if jsonp_active {
            format!("application/javascript; charset={}", self.config.charset)
        } else {
            format!("application/json; charset={}", self.config.charset)
        };
        let mut wire = WireResponse::new(200);
        wire.set_header("Content-Type", content_type);
        wire.set_header("X-Content-Type-Options", "nosniff");
        wire.set_header("X-Robots-Tag", "noindex");
        wire.set_header("X-Request-Id", request_id.to_string());

        if !self.config.enabled {
            return self.finish_error(wire, ApiError::disabled(), None);
        }

        if let Some(callback) = &jsonp_callback {
            if !self.config.jsonp_enabled {
                return self.finish_error(wire, ApiError::jsonp_disabled(), None);
            }
            if !self.jsonp_callback_re.is_match(callback) {
                warn!(callback = %callback, "Rejected JSONP callback name");
                return self.finish_error(wire, ApiError::invalid_jsonp_callback(), None);
            }
        }

        let mut request = match self.build_request(&raw) {
            Ok(request) => request,
            Err(err) => return self.finish_error(wire, err, jsonp_callback.as_deref()),
        };

        info!(
            request_id = %request_id,
            method = %request.method(),
            path = %request.path(),
            "Serving API request"
        );

        let mut result: Option<Response> = None;
        match self.authenticator.check_authentication(&request) {
            AuthCheck::Authenticated => request.set_authenticated(true),
            AuthCheck::Unhandled => {}
            AuthCheck::Rejected(err) => {
                warn!(request_id = %request_id, code = %err.code(), "Authentication rejected");
                result = Some(Response::from(err));
            }
        }

        if result.is_none() {
            for extension in &self.extensions {
                if let Some(response) = extension.pre_dispatch(&mut request) {
                    debug!(request_id = %request_id, "Dispatch replaced by extension");
                    result = Some(response);
                    break;
                }
            }
        }

        let mut response = match result {
            Some(response) => response,
            None => self.dispatcher.dispatch(&mut request),
        };

        for extension in &self.extensions {
            response = extension.post_dispatch(&request, response);
        }

        let envelope = raw.query.contains_key("_envelope");
        let embed = raw.query.contains_key("_embed");
        if envelope {
            response = self.envelope_response(&request, response, embed);
        }

        wire.status = response.status();
        for (name, value) in response.headers() {
            wire.set_header(name, value.clone());
        }

        for extension in &self.extensions {
            if extension.pre_serve(&request, &response) {
                debug!(request_id = %request_id, "Response already sent by extension");
                return wire;
            }
        }

        if request.method() == &Method::HEAD {
            return wire;
        }

        let data = self.response_to_data(&request, &response, embed && !envelope);
        match serde_json::to_string(&data) {
            Ok(mut body) => {
                if jsonp_active {
                    if let Some(callback) = &jsonp_callback {
                        // The comment prefix blocks a Flash-era JSONP exploit.
                        body = format!("/**/{callback}({body})");
                    }
                }
                wire.body = Some(body);
            }
            Err(err) => {
                // The client must never receive malformed output; fall back
                // to the one error entry we know serializes.
                error!(request_id = %request_id, error = %err, "Response encoding failed");
                let fallback = ApiError::encode_error(err.to_string());
                wire.status = 500;
                wire.body = serde_json::to_string(&fallback.wire_errors()[0]).ok();
            }
        }

        debug!(
            request_id = %request_id,
            status = wire.status,
            body_bytes = wire.body.as_ref().map(String::len),
            "Request served"
        );
        wire
    }

    /// Short-circuit path for failures before dispatch could run.
    fn finish_error(
        &self,
        mut wire: WireResponse,
        err: ApiError,
        jsonp_callback: Option<&str>,
    ) -> WireResponse {
        let response = Response::from(err);
        wire.status = response.status();
        let mut body =
            serde_json::to_string(response.data()).unwrap_or_else(|_| "[]".to_string());
        if let Some(callback) = jsonp_callback {
            body = format!("/**/{callback}({body})");
        }
        wire.body = Some(body);
        wire
    }

    /// Assemble the request from the ambient call context: method (with the
    /// POST override tunnel), route path, query, body, files, headers, raw
    /// body. A JSON content type with an unparsable body fails here, before
    /// any handler runs.
    fn build_request(&self, raw: &RawRequest) -> Result<Request, ApiError> {
        let base: Method = raw
            .method
            .to_ascii_uppercase()
            .parse()
            .map_err(|_| {
                ApiError::new("rest_invalid_method", "Unsupported request method.")
                    .with_status(400)
            })?;

        // Method override lets clients tunnel PUT/PATCH/DELETE through POST;
        // the query parameter is consulted before the header.
        let mut method = base.clone();
        if base == Method::POST {
            let override_value = raw
                .query
                .get("_method")
                .cloned()
                .or_else(|| raw.header("x-http-method-override").map(str::to_string));
            if let Some(value) = override_value {
                match value.to_ascii_uppercase().parse::<Method>() {
                    Ok(overridden) => method = overridden,
                    Err(_) => warn!(value = %value, "Ignoring invalid method override"),
                }
            }
        }

        let path = self.route_path(&raw.path);
        let mut request = Request::new(method, path);

        request.set_query_params(
            raw.query
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        request.set_headers(raw.headers.clone());
        request.set_file_params(raw.files.clone());
        request.set_raw_body(raw.body.clone());

        if !raw.body.is_empty() {
            let content_type = raw
                .header("content-type")
                .unwrap_or("")
                .to_ascii_lowercase();
            if content_type.starts_with("application/json") {
                let parsed: Value =
                    serde_json::from_slice(&raw.body).map_err(|_| ApiError::invalid_json())?;
                if let Value::Object(map) = parsed {
                    request.set_body_params(map.into_iter().collect());
                }
            } else if content_type.starts_with("application/x-www-form-urlencoded") {
                let body = String::from_utf8_lossy(&raw.body);
                let params: Params = url::form_urlencoded::parse(body.as_bytes())
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect();
                request.set_body_params(params);
            }
        }

        Ok(request)
    }

    /// Trim the API mount point off an inbound path.
    fn route_path(&self, path: &str) -> String {
        let root = self.config.root_path();
        if root != "/" {
            if let Some(remainder) = path.strip_prefix(&root) {
                if remainder.is_empty() {
                    return "/".to_string();
                }
                if remainder.starts_with('/') {
                    return remainder.to_string();
                }
            }
        }
        path.to_string()
    }

    /// Wrap a response for clients that cannot read raw HTTP metadata. The
    /// body is the link-resolved data; status and headers ride inside, and
    /// the outer response is served as a plain 200.
    fn envelope_response(&self, request: &Request, response: Response, embed: bool) -> Response {
        let body = self.response_to_data(request, &response, embed);
        let headers: Map<String, Value> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        debug!(status = response.status(), "Enveloping response");
        Response::new(json!({
            "body": body,
            "status": response.status(),
            "headers": headers,
        }))
    }

    /// Flatten a response into plain data: payload plus `_links`, and when
    /// requested an `_embedded` map of resolved same-origin sub-resources.
    fn response_to_data(&self, request: &Request, response: &Response, embed: bool) -> Value {
        let mut data = response.data().clone();
        if response.links().is_empty() {
            return data;
        }
        let Value::Object(map) = &mut data else {
            return data;
        };
        map.insert("_links".to_string(), response.links_value());
        if embed {
            let embedded = self.embed_links(request, response.links());
            if !embedded.is_empty() {
                map.insert("_embedded".to_string(), Value::Object(embedded));
            }
        }
        data
    }

    /// Resolve embeddable links by re-dispatching each as an internal GET.
    ///
    /// Entries keep positional parity with `_links`: a link that is not
    /// embeddable (or not under the API root) contributes an empty object.
    /// Relations whose entries are all placeholders are dropped, and the
    /// self relation is never embedded. Embedded sub-responses are not
    /// themselves expanded, bounding the recursion to one level.
    fn embed_links(
        &self,
        request: &Request,
        links: &BTreeMap<String, Vec<Link>>,
    ) -> Map<String, Value> {
        let mut embedded = Map::new();
        for (rel, items) in links {
            if rel == "self" {
                continue;
            }
            let mut embeds = Vec::with_capacity(items.len());
            let mut resolved_any = false;
            for link in items {
                let embeddable = link
                    .attributes
                    .get("embeddable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !embeddable {
                    embeds.push(json!({}));
                    continue;
                }
                match self.embed_target(request, &link.href) {
                    Some(value) => {
                        resolved_any = true;
                        embeds.push(value);
                    }
                    None => embeds.push(json!({})),
                }
            }
            if resolved_any {
                embedded.insert(rel.clone(), Value::Array(embeds));
            }
        }
        embedded
    }

    /// Dispatch one embeddable link as a sub-request with `context=embed`.
    /// Returns `None` for targets outside the API root.
    fn embed_target(&self, parent: &Request, href: &str) -> Option<Value> {
        let root = self.config.api_root.trim_end_matches('/');
        let remainder = href.strip_prefix(root)?;
        if !remainder.is_empty() && !remainder.starts_with('/') {
            return None;
        }
        let (path, query) = remainder.split_once('?').unwrap_or((remainder, ""));
        let path = if path.is_empty() { "/" } else { path };

        let mut query_params: Params = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        query_params.insert("context".to_string(), Value::String("embed".to_string()));

        debug!(href = %href, "Embedding linked resource");
        let mut sub_request = Request::new(Method::GET, path);
        sub_request.set_query_params(query_params);
        sub_request.set_authenticated(parent.authenticated());
        let sub_response = self.dispatcher.dispatch(&mut sub_request);
        Some(self.response_to_data(&sub_request, &sub_response, false))
    }
}
