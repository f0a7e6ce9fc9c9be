use super::pattern::PathPattern;
use crate::dispatcher::DispatchContext;
use crate::error::ApiError;
use crate::request::Request;
use crate::serializable::HandlerResult;
use anyhow::{bail, Result};
use http::Method;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Endpoint callback. Receives the finalized request plus a context exposing
/// the route table and configuration, so discovery-style handlers need no
/// ambient globals.
pub type Callback =
    Arc<dyn Fn(&mut Request, &DispatchContext<'_>) -> HandlerResult + Send + Sync>;

/// Per-route permission gate, run before the callback. `Ok(false)` becomes a
/// forbidden error with the default 401/403 policy; `Err` passes through.
pub type PermissionCheck = Arc<dyn Fn(&Request) -> Result<bool, ApiError> + Send + Sync>;

/// Per-argument validation rule: value, request, argument name.
pub type ValidateFn = Arc<dyn Fn(&Value, &Request, &str) -> Result<(), ApiError> + Send + Sync>;

/// Per-argument sanitization rule, producing the cleaned value.
pub type SanitizeFn = Arc<dyn Fn(&Value, &Request, &str) -> Result<Value, ApiError> + Send + Sync>;

/// Route-level schema generator, surfaced by the discovery index.
pub type SchemaFn = Arc<dyn Fn() -> Value + Send + Sync>;

/// Declared schema for one callback argument.
#[derive(Clone, Default)]
pub struct ArgSchema {
    pub required: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub validate: Option<ValidateFn>,
    pub sanitize: Option<SanitizeFn>,
}

impl ArgSchema {
    #[must_use]
    pub fn required() -> Self {
        Self {
            required: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn optional() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    #[must_use]
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    #[must_use]
    pub fn validate_with(
        mut self,
        rule: impl Fn(&Value, &Request, &str) -> Result<(), ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(rule));
        self
    }

    #[must_use]
    pub fn sanitize_with(
        mut self,
        rule: impl Fn(&Value, &Request, &str) -> Result<Value, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.sanitize = Some(Arc::new(rule));
        self
    }
}

impl fmt::Debug for ArgSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgSchema")
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validate", &self.validate.is_some())
            .field("sanitize", &self.sanitize.is_some())
            .finish()
    }
}

/// One method-specific endpoint definition as supplied at registration.
///
/// `methods` is a comma-separated list like `"GET"` or `"GET, POST"`; it is
/// exploded into an explicit set when the table is normalized. The optional
/// flags keep their unset state here so normalization can apply defaults.
#[derive(Clone)]
pub struct HandlerArgs {
    pub methods: String,
    pub callback: Option<Callback>,
    pub args: BTreeMap<String, ArgSchema>,
    pub permission: Option<PermissionCheck>,
    pub show_in_index: Option<bool>,
    pub accept_json: Option<bool>,
    pub accept_raw: Option<bool>,
    /// Free-form option bag carried through to the normalized handler.
    pub options: BTreeMap<String, Value>,
}

impl HandlerArgs {
    pub fn new(
        methods: &str,
        callback: impl Fn(&mut Request, &DispatchContext<'_>) -> HandlerResult
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            methods: methods.to_string(),
            callback: Some(Arc::new(callback)),
            args: BTreeMap::new(),
            permission: None,
            show_in_index: None,
            accept_json: None,
            accept_raw: None,
            options: BTreeMap::new(),
        }
    }

    /// An endpoint with no callback. Dispatching to it is a registration
    /// bug and produces a 500, but the shape is representable so the table
    /// can be assembled incrementally.
    #[must_use]
    pub fn without_callback(methods: &str) -> Self {
        Self {
            methods: methods.to_string(),
            callback: None,
            args: BTreeMap::new(),
            permission: None,
            show_in_index: None,
            accept_json: None,
            accept_raw: None,
            options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, name: &str, schema: ArgSchema) -> Self {
        self.args.insert(name.to_string(), schema);
        self
    }

    #[must_use]
    pub fn permission(
        mut self,
        check: impl Fn(&Request) -> Result<bool, ApiError> + Send + Sync + 'static,
    ) -> Self {
        self.permission = Some(Arc::new(check));
        self
    }

    #[must_use]
    pub fn show_in_index(mut self, show: bool) -> Self {
        self.show_in_index = Some(show);
        self
    }

    #[must_use]
    pub fn accept_json(mut self, accept: bool) -> Self {
        self.accept_json = Some(accept);
        self
    }

    #[must_use]
    pub fn accept_raw(mut self, accept: bool) -> Self {
        self.accept_raw = Some(accept);
        self
    }

    #[must_use]
    pub fn option(mut self, key: &str, value: Value) -> Self {
        self.options.insert(key.to_string(), value);
        self
    }
}

impl fmt::Debug for HandlerArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerArgs")
            .field("methods", &self.methods)
            .field("callback", &self.callback.is_some())
            .field("args", &self.args)
            .finish()
    }
}

/// A fully normalized endpoint definition, as returned by
/// [`RouteTable::routes`]: methods exploded, defaults applied.
#[derive(Clone)]
pub struct Handler {
    pub callback: Option<Callback>,
    pub methods: HashSet<Method>,
    pub args: BTreeMap<String, ArgSchema>,
    pub permission: Option<PermissionCheck>,
    pub show_in_index: bool,
    pub accept_json: bool,
    pub accept_raw: bool,
    pub options: BTreeMap<String, Value>,
}

impl Handler {
    #[inline]
    #[must_use]
    pub fn allows(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("methods", &self.methods)
            .field("callback", &self.callback.is_some())
            .field("args", &self.args)
            .field("show_in_index", &self.show_in_index)
            .finish()
    }
}

/// Route-level settings that ride alongside the handler list.
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Namespace label the route was registered under.
    pub namespace: Option<String>,
    /// Schema generator surfaced by discovery.
    pub schema: Option<SchemaFn>,
    /// Anything else the embedder wants to attach.
    pub extra: BTreeMap<String, Value>,
}

impl RouteOptions {
    /// Shallow merge: the newer registration wins per key.
    fn merge(&mut self, newer: RouteOptions) {
        if newer.namespace.is_some() {
            self.namespace = newer.namespace;
        }
        if newer.schema.is_some() {
            self.schema = newer.schema;
        }
        self.extra.extend(newer.extra);
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("namespace", &self.namespace)
            .field("schema", &self.schema.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}

/// The registration unit: one or more endpoint definitions plus route-level
/// options. A single `HandlerArgs` converts into a one-element set.
#[derive(Debug, Clone, Default)]
pub struct RouteSpec {
    pub handlers: Vec<HandlerArgs>,
    pub options: RouteOptions,
}

impl RouteSpec {
    #[must_use]
    pub fn new(handlers: Vec<HandlerArgs>) -> Self {
        Self {
            handlers,
            options: RouteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_schema(mut self, schema: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.options.schema = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn option(mut self, key: &str, value: Value) -> Self {
        self.options.extra.insert(key.to_string(), value);
        self
    }
}

impl From<HandlerArgs> for RouteSpec {
    fn from(handler: HandlerArgs) -> Self {
        Self::new(vec![handler])
    }
}

/// One entry of the normalized snapshot.
#[derive(Clone)]
pub struct Route {
    pub pattern: Arc<PathPattern>,
    pub namespace: Option<String>,
    pub handlers: Vec<Arc<Handler>>,
    pub schema: Option<SchemaFn>,
    pub options: BTreeMap<String, Value>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("pattern", &self.pattern.raw())
            .field("namespace", &self.namespace)
            .field("handlers", &self.handlers)
            .field("schema", &self.schema.is_some())
            .finish()
    }
}

struct TableEntry {
    pattern: Arc<PathPattern>,
    spec: RouteSpec,
}

/// Ordered collection of path-pattern registrations.
///
/// Built once during initialization and treated as read-only while serving;
/// registration order is authoritative for precedence, so callers register
/// more specific patterns before more general ones. Pattern strings are
/// unique keys: re-registering replaces or merges per the `override` flag.
#[derive(Default)]
pub struct RouteTable {
    entries: Vec<TableEntry>,
    index: HashMap<String, usize>,
    namespaces: Vec<String>,
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route.
    ///
    /// With a namespace the full pattern becomes `/{namespace}/{route}`, and
    /// the first registration under a namespace also registers the
    /// namespace's own index route. For an existing pattern,
    /// `override_existing` replaces the whole entry; otherwise the new
    /// handler set is appended and route options shallow-merge with the
    /// newer registration winning per key.
    pub fn register(
        &mut self,
        namespace: Option<&str>,
        route: &str,
        spec: impl Into<RouteSpec>,
        override_existing: bool,
    ) -> Result<()> {
        let mut spec = spec.into();

        let full_pattern = match namespace {
            Some(raw_namespace) => {
                let label = raw_namespace.trim_matches('/');
                if label.is_empty() {
                    bail!("namespace must not be empty");
                }
                if !self.namespaces.iter().any(|existing| existing == label) {
                    self.namespaces.push(label.to_string());
                    self.register_namespace_index(label)?;
                }
                spec.options.namespace = Some(label.to_string());
                let tail = route.trim_matches('/');
                if tail.is_empty() {
                    format!("/{label}")
                } else {
                    format!("/{label}/{tail}")
                }
            }
            None => {
                let tail = route.trim_matches('/');
                if tail.is_empty() {
                    "/".to_string()
                } else {
                    format!("/{tail}")
                }
            }
        };

        if spec.handlers.is_empty() {
            bail!("route {full_pattern:?} registered with no handlers");
        }
        for handler in &spec.handlers {
            if parse_methods(&handler.methods)?.is_empty() {
                bail!("handler on route {full_pattern:?} has an empty method set");
            }
        }

        match self.index.get(&full_pattern).copied() {
            Some(position) if override_existing => {
                debug!(pattern = %full_pattern, "Route replaced");
                self.entries[position].spec = spec;
            }
            Some(position) => {
                debug!(
                    pattern = %full_pattern,
                    added_handlers = spec.handlers.len(),
                    "Route merged"
                );
                let entry = &mut self.entries[position];
                entry.spec.handlers.extend(spec.handlers);
                entry.spec.options.merge(spec.options);
            }
            None => {
                let pattern = Arc::new(PathPattern::compile(&full_pattern)?);
                info!(
                    pattern = %full_pattern,
                    handlers = spec.handlers.len(),
                    position = self.entries.len(),
                    "Route registered"
                );
                self.index.insert(full_pattern, self.entries.len());
                self.entries.push(TableEntry { pattern, spec });
            }
        }
        Ok(())
    }

    fn register_namespace_index(&mut self, namespace: &str) -> Result<()> {
        let mut spec = RouteSpec::from(
            HandlerArgs::new("GET", crate::server::discovery::namespace_index)
                .arg(
                    "namespace",
                    ArgSchema::optional().with_default(json!(namespace)),
                )
                .arg("context", ArgSchema::optional().with_default(json!("view"))),
        );
        spec.options.namespace = Some(namespace.to_string());
        self.register(None, &format!("/{namespace}"), spec, false)
    }

    /// Namespace labels in first-registration order.
    #[must_use]
    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, pattern: &str) -> bool {
        self.index.contains_key(pattern)
    }

    /// Normalized snapshot in registration order.
    ///
    /// Every handler gets its method list exploded into a set and defaults
    /// applied for unset fields (`show_in_index` on, `accept_json` and
    /// `accept_raw` off, empty args). Idempotent and free of side effects,
    /// so it can be taken repeatedly while serving a single request.
    #[must_use]
    pub fn routes(&self) -> Vec<Route> {
        self.entries
            .iter()
            .map(|entry| Route {
                pattern: Arc::clone(&entry.pattern),
                namespace: entry.spec.options.namespace.clone(),
                handlers: entry
                    .spec
                    .handlers
                    .iter()
                    .map(|handler| {
                        Arc::new(Handler {
                            callback: handler.callback.clone(),
                            methods: parse_methods(&handler.methods).unwrap_or_default(),
                            args: handler.args.clone(),
                            permission: handler.permission.clone(),
                            show_in_index: handler.show_in_index.unwrap_or(true),
                            accept_json: handler.accept_json.unwrap_or(false),
                            accept_raw: handler.accept_raw.unwrap_or(false),
                            options: handler.options.clone(),
                        })
                    })
                    .collect(),
                schema: entry.spec.options.schema.clone(),
                options: entry.spec.options.extra.clone(),
            })
            .collect()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let patterns: Vec<&str> = self
            .entries
            .iter()
            .map(|entry| entry.pattern.raw())
            .collect();
        f.debug_struct("RouteTable")
            .field("patterns", &patterns)
            .field("namespaces", &self.namespaces)
            .finish()
    }
}

/// Explode a comma-separated method list into `http::Method` values.
fn parse_methods(methods: &str) -> Result<HashSet<Method>> {
    let mut set = HashSet::new();
    for part in methods.split(',') {
        let token = part.trim();
        if token.is_empty() {
            continue;
        }
        match token.to_ascii_uppercase().parse::<Method>() {
            Ok(method) => {
                set.insert(method);
            }
            Err(_) => bail!("unknown HTTP method {token:?}"),
        }
    }
    Ok(set)
}
