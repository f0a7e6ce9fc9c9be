//! API responses with hypermedia link relations.

use crate::error::ApiError;
use crate::routes::Handler;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A single hyperlink: target URL plus free-form attributes.
///
/// The `embeddable` attribute (boolean) marks a link the front-end may
/// resolve inline when the client asks for `_embed`.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub href: String,
    pub attributes: Map<String, Value>,
}

impl Link {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            attributes: Map::new(),
        }
    }

    /// Wire form: `{href, ...attributes}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("href".to_string(), Value::String(self.href.clone()));
        for (key, value) in &self.attributes {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Outcome of a dispatched call: payload, status, headers, and links.
///
/// Handlers may build one directly to control status or headers; plain
/// values returned from handlers are coerced into a 200 response. Once the
/// front-end starts serializing, only the enveloping step may still add
/// headers or links.
#[derive(Debug, Clone)]
pub struct Response {
    data: Value,
    status: u16,
    headers: HashMap<String, String>,
    links: BTreeMap<String, Vec<Link>>,
    matched_route: Option<String>,
    matched_handler: Option<Arc<Handler>>,
}

impl Response {
    /// A 200 response around the given payload.
    #[must_use]
    pub fn new(data: Value) -> Self {
        Self::with_status(data, 200)
    }

    #[must_use]
    pub fn with_status(data: Value, status: u16) -> Self {
        debug_assert!((100..=599).contains(&status), "status must be three digits");
        Self {
            data,
            status,
            headers: HashMap::new(),
            links: BTreeMap::new(),
            matched_route: None,
            matched_handler: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn set_data(&mut self, data: Value) {
        self.data = data;
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        debug_assert!((100..=599).contains(&status), "status must be three digits");
        self.status = status;
    }

    /// True for any 4xx/5xx response.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Add or replace a header (name comparison is case-insensitive).
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append a link under a relation.
    pub fn add_link(&mut self, rel: impl Into<String>, href: impl Into<String>) {
        self.add_link_with(rel, href, Map::new());
    }

    /// Append a link with attributes, e.g. `{"embeddable": true}`.
    pub fn add_link_with(
        &mut self,
        rel: impl Into<String>,
        href: impl Into<String>,
        attributes: Map<String, Value>,
    ) {
        self.links.entry(rel.into()).or_default().push(Link {
            href: href.into(),
            attributes,
        });
    }

    /// Drop every link under a relation.
    pub fn remove_link(&mut self, rel: &str) {
        self.links.remove(rel);
    }

    #[must_use]
    pub fn links(&self) -> &BTreeMap<String, Vec<Link>> {
        &self.links
    }

    /// The `_links` wire form: `{rel: [{href, ...attributes}]}`.
    #[must_use]
    pub fn links_value(&self) -> Value {
        let mut map = Map::new();
        for (rel, links) in &self.links {
            let items: Vec<Value> = links.iter().map(Link::to_value).collect();
            map.insert(rel.clone(), Value::Array(items));
        }
        Value::Object(map)
    }

    pub fn set_matched_route(&mut self, pattern: impl Into<String>) {
        self.matched_route = Some(pattern.into());
    }

    #[must_use]
    pub fn matched_route(&self) -> Option<&str> {
        self.matched_route.as_deref()
    }

    pub fn set_matched_handler(&mut self, handler: Arc<Handler>) {
        self.matched_handler = Some(handler);
    }

    #[must_use]
    pub fn matched_handler(&self) -> Option<&Arc<Handler>> {
        self.matched_handler.as_ref()
    }
}

/// The single error-to-response conversion point. The payload becomes the
/// flattened wire error list; the status comes from the first error's
/// declared status, defaulting to 500.
impl From<ApiError> for Response {
    fn from(error: ApiError) -> Self {
        let status = error.status().unwrap_or(500);
        Response::with_status(error.to_wire_value(), status)
    }
}
