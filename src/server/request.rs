use may_minihttp::Request as HttpRequest;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use tracing::{debug, info};

/// The ambient context of one inbound call, before normalization.
///
/// The HTTP binding produces one of these per connection turn; embedders
/// and tests can build them directly with the `with_*` helpers, which is
/// how internal calls (and the test suites) exercise the full front-end
/// without sockets.
#[derive(Debug, Clone)]
pub struct RawRequest {
    /// HTTP method token as received, e.g. `GET`.
    pub method: String,
    /// URL path without the query string.
    pub path: String,
    /// Decoded query string parameters.
    pub query: HashMap<String, String>,
    /// Headers with lowercase names.
    pub headers: HashMap<String, String>,
    /// Uploaded file metadata, supplied by the embedding host (the plain
    /// HTTP binding does not parse multipart bodies).
    pub files: HashMap<String, Value>,
    /// Raw request body bytes.
    pub body: Vec<u8>,
}

impl RawRequest {
    /// Build from a method and a target that may carry a query string,
    /// e.g. `/content/v1/articles?page=2`.
    #[must_use]
    pub fn new(method: &str, target: &str) -> Self {
        let path = target.split('?').next().unwrap_or("/").to_string();
        Self {
            method: method.to_string(),
            path,
            query: parse_query_params(target),
            headers: HashMap::new(),
            files: HashMap::new(),
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    /// Set a JSON body along with the matching content type.
    #[must_use]
    pub fn with_json_body(mut self, value: &Value) -> Self {
        self.body = value.to_string().into_bytes();
        self.headers.insert(
            "content-type".to_string(),
            "application/json".to_string(),
        );
        self
    }

    /// Set a form-encoded body along with the matching content type.
    #[must_use]
    pub fn with_form_body(mut self, pairs: &[(&str, &str)]) -> Self {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in pairs {
            serializer.append_pair(name, value);
        }
        self.body = serializer.finish().into_bytes();
        self.headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        self
    }

    #[must_use]
    pub fn with_file(mut self, name: &str, meta: Value) -> Self {
        self.files.insert(name.to_string(), meta);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Header lookup by lowercase name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parse query string parameters from a URL target.
///
/// Everything after the first `?` is URL-decoded into a name/value map.
#[must_use]
pub fn parse_query_params(target: &str) -> HashMap<String, String> {
    if let Some(pos) = target.find('?') {
        let query_str = &target[pos + 1..];
        url::form_urlencoded::parse(query_str.as_bytes())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    } else {
        HashMap::new()
    }
}

/// Extract a [`RawRequest`] from a `may_minihttp::Request`.
pub fn parse_raw(req: HttpRequest) -> RawRequest {
    let method = req.method().to_string();
    let raw_path = req.path().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HashMap<String, String> = req
        .headers()
        .iter()
        .map(|h| {
            (
                h.name.to_ascii_lowercase(),
                String::from_utf8_lossy(h.value).to_string(),
            )
        })
        .collect();
    debug!(
        header_count = headers.len(),
        header_names = ?headers.keys().take(20).collect::<Vec<_>>(),
        "Headers extracted"
    );

    let query = parse_query_params(&raw_path);
    debug!(param_count = query.len(), "Query params parsed");

    let mut body = Vec::new();
    if req.body().read_to_end(&mut body).is_err() {
        body.clear();
    }

    info!(
        method = %method,
        path = %path,
        body_bytes = body.len(),
        "HTTP request parsed"
    );

    RawRequest {
        method,
        path,
        query,
        headers,
        files: HashMap::new(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_params() {
        let q = parse_query_params("/p?x=1&y=2");
        assert_eq!(q.get("x"), Some(&"1".to_string()));
        assert_eq!(q.get("y"), Some(&"2".to_string()));
    }

    #[test]
    fn query_values_are_url_decoded() {
        let q = parse_query_params("/p?title=hello%20world&_jsonp=cb.fn");
        assert_eq!(q.get("title"), Some(&"hello world".to_string()));
        assert_eq!(q.get("_jsonp"), Some(&"cb.fn".to_string()));
    }

    #[test]
    fn builder_splits_target_and_lowercases_headers() {
        let raw = RawRequest::new("POST", "/content/v1/articles?_envelope")
            .with_header("X-HTTP-Method-Override", "PUT");
        assert_eq!(raw.path, "/content/v1/articles");
        assert!(raw.query.contains_key("_envelope"));
        assert_eq!(raw.header("x-http-method-override"), Some("PUT"));
    }
}
