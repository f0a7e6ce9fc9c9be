//! # Dispatcher
//!
//! Matching and execution for inbound API calls.
//!
//! The dispatcher owns the per-request pipeline between the front-end and
//! the endpoint callbacks:
//!
//! 1. Scan routes in registration order; first matching route and method
//!    combination wins.
//! 2. Merge extracted url params into the request and attach the matched
//!    handler definition as its attributes.
//! 3. Sanitize supplied params, seed declared defaults, then gate on
//!    required params, validation rules, and the permission check.
//! 4. Invoke the callback (or an extension's override) and normalize the
//!    outcome into a response, stamped with the matched route and handler.
//!
//! Everything runs synchronously on the caller's stack. Errors are values
//! flowing through the same return channel as successes; the dispatcher
//! turns them into wire-shaped error responses exactly once, at the end.

mod core;

pub use self::core::{DispatchContext, Dispatcher};
