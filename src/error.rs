//! First-class error values for the dispatch pipeline.
//!
//! Errors travel through the same return channel as successful results and
//! are converted to a wire response exactly once, at the serving boundary.
//! Each error carries a stable string `code`, a human-readable `message`,
//! and a free-form `data` bag; `data.status` selects the HTTP status code
//! used when the error reaches the wire.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::fmt;

/// Wire form of a single error entry.
///
/// The serving boundary always emits a JSON *array* of these, never a bare
/// object, so clients can treat every failure body uniformly.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WireError {
    pub code: String,
    pub message: String,
    pub data: Value,
}

/// A pipeline error value.
///
/// `ApiError` is never thrown across the pipeline; handlers, permission
/// checks, and validation steps return it and the dispatcher routes on it.
/// An error may aggregate further errors (for example one entry per invalid
/// parameter), which are flattened into the wire list after the primary.
#[derive(Debug, Clone)]
pub struct ApiError {
    code: String,
    message: String,
    data: Value,
    additional: Vec<ApiError>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            data: Value::Null,
            additional: Vec::new(),
        }
    }

    /// Set `data.status`, creating the data object if needed.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        match &mut self.data {
            Value::Object(map) => {
                map.insert("status".to_string(), json!(status));
            }
            _ => {
                let mut map = Map::new();
                map.insert("status".to_string(), json!(status));
                self.data = Value::Object(map);
            }
        }
        self
    }

    /// Replace the data bag wholesale.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    #[inline]
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    #[inline]
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// HTTP status declared in the data bag, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.data
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
    }

    /// Append a secondary error, flattened after this one on the wire.
    pub fn add(&mut self, error: ApiError) {
        self.additional.push(error);
    }

    /// Flatten this error and all aggregated errors into wire entries.
    ///
    /// The result always has at least one entry.
    #[must_use]
    pub fn wire_errors(&self) -> Vec<WireError> {
        let mut list = vec![WireError {
            code: self.code.clone(),
            message: self.message.clone(),
            data: self.data.clone(),
        }];
        for extra in &self.additional {
            list.extend(extra.wire_errors());
        }
        list
    }

    /// The full wire body: a JSON array of `{code, message, data}`.
    #[must_use]
    pub fn to_wire_value(&self) -> Value {
        serde_json::to_value(self.wire_errors()).unwrap_or_else(|_| json!([]))
    }

    // Canned constructors for the codes this crate emits. Keeping them here
    // keeps code strings and default statuses in one place.

    #[must_use]
    pub fn no_route() -> Self {
        Self::new(
            "rest_no_route",
            "No route was found matching the URL and request method.",
        )
        .with_status(404)
    }

    #[must_use]
    pub fn invalid_handler() -> Self {
        Self::new(
            "rest_invalid_handler",
            "The handler for the route is invalid.",
        )
        .with_status(500)
    }

    /// Default permission failure. 403 once authenticated, 401 before.
    #[must_use]
    pub fn forbidden(authenticated: bool) -> Self {
        Self::new("rest_forbidden", "Sorry, you are not allowed to do that.")
            .with_status(if authenticated { 403 } else { 401 })
    }

    #[must_use]
    pub fn missing_params(names: Vec<String>) -> Self {
        let list = names.join(", ");
        Self::new(
            "rest_missing_callback_param",
            format!("Missing parameter(s): {list}"),
        )
        .with_data(json!({ "status": 400, "params": names }))
    }

    #[must_use]
    pub fn invalid_params(details: Map<String, Value>) -> Self {
        Self::new("rest_invalid_param", "Invalid parameter(s) supplied.")
            .with_data(json!({ "status": 400, "params": details }))
    }

    #[must_use]
    pub fn invalid_json() -> Self {
        Self::new("rest_invalid_json", "Invalid JSON body passed.").with_status(400)
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::new("rest_disabled", "The API is disabled on this site.").with_status(404)
    }

    #[must_use]
    pub fn jsonp_disabled() -> Self {
        Self::new("rest_jsonp_disabled", "JSONP support is disabled on this site.").with_status(400)
    }

    #[must_use]
    pub fn invalid_jsonp_callback() -> Self {
        Self::new("rest_callback_invalid", "Invalid JSONP callback function.").with_status(400)
    }

    #[must_use]
    pub fn encode_error(detail: impl Into<String>) -> Self {
        Self::new("rest_encode_error", detail).with_status(500)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}
