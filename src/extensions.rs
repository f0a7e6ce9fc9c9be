//! Extension points around dispatch and serving.
//!
//! Extensions run in registration order. Each hook has a no-op default, so
//! implementors override only what they need, and every hook receives the
//! live request so decisions can key off method, path, or params.

use crate::dispatcher::DispatchContext;
use crate::request::Request;
use crate::response::Response;
use crate::serializable::HandlerResult;

/// Hooks inside the dispatcher, consulted after validation and permission
/// checks pass but before the callback runs.
pub trait DispatchExtension: Send + Sync {
    /// Replace the dispatch outcome for this request. Returning `Some`
    /// skips the callback entirely; protocol-compatibility shims use this
    /// to answer in an older wire dialect.
    fn override_dispatch(
        &self,
        _request: &mut Request,
        _ctx: &DispatchContext<'_>,
    ) -> Option<HandlerResult> {
        None
    }
}

/// Hooks around the front-end serving pipeline.
pub trait ServerExtension: Send + Sync {
    /// Replace the dispatch step entirely. The first extension returning
    /// `Some` wins; used for short-circuit caching or mocking.
    fn pre_dispatch(&self, _request: &mut Request) -> Option<Response> {
        None
    }

    /// Rewrite the final response before enveloping and serialization.
    fn post_dispatch(&self, _request: &Request, response: Response) -> Response {
        response
    }

    /// Take over output. Returning `true` signals the response was already
    /// sent (custom serialization, streaming); the front-end then stops
    /// before writing a body.
    fn pre_serve(&self, _request: &Request, _response: &Response) -> bool {
        false
    }
}
