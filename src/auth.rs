//! Authentication delegation.
//!
//! The dispatch core never implements an authentication mechanism itself.
//! The front-end asks a pluggable [`Authenticator`] once per call, before
//! dispatch; the answer feeds the request's authenticated flag, which in
//! turn selects the 401-vs-403 default when a permission check fails.

use crate::error::ApiError;
use crate::request::Request;

/// Outcome of the authentication check.
#[derive(Debug)]
pub enum AuthCheck {
    /// No opinion; the call proceeds unauthenticated.
    Unhandled,
    /// Credentials checked out; the call proceeds authenticated.
    Authenticated,
    /// Credentials were presented and rejected; dispatch is preempted and
    /// the error is served as-is.
    Rejected(ApiError),
}

/// Pluggable authentication collaborator.
pub trait Authenticator: Send + Sync {
    fn check_authentication(&self, request: &Request) -> AuthCheck;
}

/// Default authenticator: everything proceeds as anonymous.
pub struct OpenAccess;

impl Authenticator for OpenAccess {
    fn check_authentication(&self, _request: &Request) -> AuthCheck {
        AuthCheck::Unhandled
    }
}
