//! # Waypost
//!
//! **Waypost** is the dispatch core of a REST-style JSON API layered over a
//! content platform: an ordered route table, a validation and permission
//! pipeline, and a serving front-end with hypermedia responses. Storage,
//! authentication backends, and admin surfaces stay outside, behind narrow
//! collaborator traits.
//!
//! ## Architecture
//!
//! - **[`routes`]** - ordered pattern registry with namespace grouping,
//!   override/merge registration, and normalized snapshots
//! - **[`dispatcher`]** - matches a request to a route and handler and runs
//!   the sanitize/validate/permission/execute pipeline
//! - **[`request`]** / **[`response`]** - the per-call data model: merged
//!   parameter sources on the way in, payload plus link relations on the
//!   way out
//! - **[`server`]** - the front-end: content negotiation (including JSONP),
//!   method-override tunneling, enveloping, link embedding, discovery
//!   index, serialization, and the `may_minihttp` transport binding
//! - **[`error`]** - first-class error values with stable codes, converted
//!   to wire responses at exactly one boundary
//! - **[`auth`]** / **[`extensions`]** - pluggable collaborator seams for
//!   authentication and pre/post dispatch behavior
//!
//! ## Request Handling Flow
//!
//! ```text
//! HTTP request
//!   └─ AppService (may_minihttp binding)
//!        └─ ApiServer::serve
//!             ├─ content negotiation, JSONP checks, disabled switch
//!             ├─ build Request (method override, query/body/file params)
//!             ├─ Authenticator::check_authentication
//!             ├─ ServerExtension::pre_dispatch            (may short-circuit)
//!             ├─ Dispatcher::dispatch
//!             │    ├─ route scan in registration order
//!             │    ├─ sanitize -> defaults -> required/validate
//!             │    ├─ permission check (403/401 policy)
//!             │    └─ callback (or DispatchExtension override)
//!             ├─ ServerExtension::post_dispatch
//!             ├─ envelope (`_envelope`), links + embedding (`_embed`)
//!             └─ serialize (JSONP wrap) and write
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use std::sync::Arc;
//! use waypost::{ApiConfig, ApiServer, AppService, HandlerArgs, HttpServer, RouteTable};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut table = RouteTable::new();
//! table.register(
//!     Some("content/v1"),
//!     "/articles/{id}",
//!     HandlerArgs::new("GET", |req, _ctx| {
//!         Ok(json!({ "id": req.get_param("id") }).into())
//!     }),
//!     false,
//! )?;
//!
//! let server = Arc::new(ApiServer::new(table, ApiConfig::from_env())?);
//! let handle = HttpServer(AppService::new(server)).start("0.0.0.0:8080")?;
//! handle.join().ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency Model
//!
//! The whole pipeline is synchronous from the front-end's perspective: one
//! request, one logical thread of control. The route table is built during
//! initialization and read-only afterward, which is what makes sharing one
//! `ApiServer` across concurrently served connections safe. Embedding
//! dispatches sub-requests recursively on the same call stack. There is no
//! cancellation or timeout primitive; a hung handler blocks its serving
//! context, which is an accepted and documented limitation of this design.

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod extensions;
pub mod ids;
pub mod request;
pub mod response;
pub mod routes;
pub mod serializable;
pub mod server;

pub use auth::{AuthCheck, Authenticator, OpenAccess};
pub use config::ApiConfig;
pub use dispatcher::{DispatchContext, Dispatcher};
pub use error::{ApiError, WireError};
pub use extensions::{DispatchExtension, ServerExtension};
pub use ids::RequestId;
pub use request::{Params, Request};
pub use response::{Link, Response};
pub use routes::{
    ArgSchema, Callback, Handler, HandlerArgs, PathPattern, PermissionCheck, Route, RouteOptions,
    RouteSpec, RouteTable,
};
pub use serializable::{ApiSerializable, HandlerOutcome, HandlerResult};
pub use server::{ApiServer, AppService, HttpServer, RawRequest, ServerHandle, WireResponse};
