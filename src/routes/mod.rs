//! # Route Table
//!
//! The ordered registry of path patterns and their endpoint handler sets.
//!
//! Registration happens during an initialization phase that completes before
//! any request is dispatched; afterward the table is shared read-only across
//! calls. Two-phase like the matcher it feeds:
//!
//! 1. **Compilation**: at registration, patterns such as
//!    `/content/v1/articles/{id}` are compiled into anchored,
//!    case-insensitive regexes with named captures.
//! 2. **Normalization**: [`RouteTable::routes`] produces a snapshot with
//!    method lists exploded into sets and per-handler defaults applied. The
//!    snapshot is what the dispatcher iterates, in registration order.
//!
//! ## Example
//!
//! ```rust,ignore
//! use waypost::{ArgSchema, HandlerArgs, RouteTable};
//! use serde_json::json;
//!
//! let mut table = RouteTable::new();
//! table.register(
//!     Some("content/v1"),
//!     "/articles/{id}",
//!     HandlerArgs::new("GET", |req, _ctx| {
//!         Ok(json!({ "id": req.get_param("id") }).into())
//!     })
//!     .arg("context", ArgSchema::optional().with_default(json!("view"))),
//!     false,
//! )?;
//! ```

mod core;
mod pattern;

pub use self::core::{
    ArgSchema, Callback, Handler, HandlerArgs, PermissionCheck, Route, RouteOptions, RouteSpec,
    RouteTable, SanitizeFn, SchemaFn, ValidateFn,
};
pub use pattern::PathPattern;
