//! Normalized representation of an inbound API call.
//!
//! A `Request` is created per call and populated incrementally by the
//! front-end (query, body, files, headers, raw body), then finalized by the
//! dispatcher with url params and the matched handler's declared argument
//! schema. It is mutated only during dispatch and read-only afterward.

use crate::error::ApiError;
use crate::routes::Handler;
use http::Method;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// One parameter map: declared argument name to JSON value.
pub type Params = HashMap<String, Value>;

#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    url_params: Params,
    query_params: Params,
    body_params: Params,
    file_params: Params,
    default_params: Params,
    /// Lowercase header names, per-request values.
    headers: HashMap<String, String>,
    raw_body: Vec<u8>,
    attributes: Option<Arc<Handler>>,
    matched_route: Option<String>,
    authenticated: bool,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            url_params: Params::new(),
            query_params: Params::new(),
            body_params: Params::new(),
            file_params: Params::new(),
            default_params: Params::new(),
            headers: HashMap::new(),
            raw_body: Vec::new(),
            attributes: None,
            matched_route: None,
            authenticated: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Route path relative to the API root, e.g. `/content/v1/articles/3`.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[inline]
    #[must_use]
    pub fn authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn set_authenticated(&mut self, authenticated: bool) {
        self.authenticated = authenticated;
    }

    pub fn set_url_params(&mut self, params: Params) {
        self.url_params = params;
    }

    pub fn set_query_params(&mut self, params: Params) {
        self.query_params = params;
    }

    pub fn set_body_params(&mut self, params: Params) {
        self.body_params = params;
    }

    pub fn set_file_params(&mut self, params: Params) {
        self.file_params = params;
    }

    /// Seed declared defaults for arguments that received no value.
    pub fn set_default_params(&mut self, params: Params) {
        self.default_params = params;
    }

    #[must_use]
    pub fn url_params(&self) -> &Params {
        &self.url_params
    }

    #[must_use]
    pub fn query_params(&self) -> &Params {
        &self.query_params
    }

    #[must_use]
    pub fn body_params(&self) -> &Params {
        &self.body_params
    }

    #[must_use]
    pub fn file_params(&self) -> &Params {
        &self.file_params
    }

    #[must_use]
    pub fn default_params(&self) -> &Params {
        &self.default_params
    }

    /// Replace all headers, canonicalizing names to lowercase.
    pub fn set_headers(&mut self, headers: HashMap<String, String>) {
        self.headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Header lookup, case-insensitive per RFC 7230.
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    #[must_use]
    pub fn raw_body(&self) -> &[u8] {
        &self.raw_body
    }

    pub fn set_raw_body(&mut self, body: Vec<u8>) {
        self.raw_body = body;
    }

    /// Attach the matched handler definition; sanitization and validation
    /// read the declared argument schema from here.
    pub fn set_attributes(&mut self, handler: Arc<Handler>) {
        self.attributes = Some(handler);
    }

    #[must_use]
    pub fn attributes(&self) -> Option<&Arc<Handler>> {
        self.attributes.as_ref()
    }

    pub fn set_matched_route(&mut self, pattern: impl Into<String>) {
        self.matched_route = Some(pattern.into());
    }

    #[must_use]
    pub fn matched_route(&self) -> Option<&str> {
        self.matched_route.as_deref()
    }

    fn sources(&self) -> [&Params; 4] {
        [
            &self.url_params,
            &self.query_params,
            &self.body_params,
            &self.default_params,
        ]
    }

    /// Look a declared argument up across sources: url params win over query
    /// params, which win over body params, with declared defaults last.
    #[must_use]
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.sources().into_iter().find_map(|params| params.get(name))
    }

    /// Whether the argument was supplied by any source, defaults included.
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.sources()
            .into_iter()
            .any(|params| params.contains_key(name))
    }

    /// Write a parameter back. Every non-default source that already holds
    /// the key is updated so later lookups agree regardless of source order;
    /// a brand new key lands in the primary (url) slot.
    pub fn set_param(&mut self, name: &str, value: Value) {
        let mut found = false;
        for params in [
            &mut self.url_params,
            &mut self.query_params,
            &mut self.body_params,
        ] {
            if let Some(existing) = params.get_mut(name) {
                *existing = value.clone();
                found = true;
            }
        }
        if !found {
            self.url_params.insert(name.to_string(), value);
        }
    }

    /// Run the matched handler's per-argument sanitizers over supplied
    /// values. Failures are collected per argument into one 400 error.
    pub fn sanitize_params(&mut self) -> Result<(), ApiError> {
        let Some(attributes) = self.attributes.clone() else {
            return Ok(());
        };
        let mut invalid = Map::new();
        for (name, schema) in &attributes.args {
            let Some(sanitize) = &schema.sanitize else {
                continue;
            };
            let Some(value) = self.get_param(name).cloned() else {
                continue;
            };
            match sanitize(&value, self, name) {
                Ok(clean) => self.set_param(name, clean),
                Err(error) => {
                    invalid.insert(name.clone(), Value::String(error.message().to_string()));
                }
            }
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ApiError::invalid_params(invalid))
        }
    }

    /// Precondition gate for the matched handler's declared arguments.
    ///
    /// All required arguments are checked in one pass, so a single 400 names
    /// every missing parameter. Presence means the key was supplied by some
    /// source (or seeded from a default), not that its value is truthy.
    /// Supplied values are then run through their validation rules, again
    /// collecting all failures into one error.
    pub fn has_valid_params(&self) -> Result<(), ApiError> {
        let Some(attributes) = &self.attributes else {
            return Ok(());
        };
        let mut missing = Vec::new();
        for (name, schema) in &attributes.args {
            if schema.required && !self.has_param(name) {
                missing.push(name.clone());
            }
        }
        if !missing.is_empty() {
            return Err(ApiError::missing_params(missing));
        }
        let mut invalid = Map::new();
        for (name, schema) in &attributes.args {
            let Some(validate) = &schema.validate else {
                continue;
            };
            let Some(value) = self.get_param(name) else {
                continue;
            };
            if let Err(error) = validate(value, self, name) {
                invalid.insert(name.clone(), Value::String(error.message().to_string()));
            }
        }
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(ApiError::invalid_params(invalid))
        }
    }
}
