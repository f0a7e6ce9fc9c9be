//! Tagged payload conversion.
//!
//! Handlers can produce three shapes of outcome: a plain JSON value, a
//! domain entity that knows how to render itself, or a fully formed
//! [`Response`]. The variants are resolved into a `Response` at exactly one
//! point, before the front-end flattens and encodes the payload, so nothing
//! downstream has to reason about arbitrary object graphs.

use crate::error::ApiError;
use crate::response::Response;
use serde_json::Value;
use std::fmt;

/// Capability for domain objects that can render themselves as plain data.
///
/// Storage-layer entities (posts, terms, users and so on) implement this so
/// handlers can return them directly without knowing the wire shape.
pub trait ApiSerializable: Send + Sync {
    fn to_json(&self) -> Value;
}

/// What a handler callback produced.
pub enum HandlerOutcome {
    /// A plain serializable value, coerced into a 200 response.
    Value(Value),
    /// A domain entity, rendered through [`ApiSerializable::to_json`].
    Entity(Box<dyn ApiSerializable>),
    /// A response the handler assembled itself (status, headers, links).
    Response(Response),
}

/// Return type shared by handler callbacks and dispatch overrides.
pub type HandlerResult = Result<HandlerOutcome, ApiError>;

impl HandlerOutcome {
    /// Resolve the outcome into a response. Plain values and entities get a
    /// fresh 200 response; an explicit response passes through untouched.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            HandlerOutcome::Value(value) => Response::new(value),
            HandlerOutcome::Entity(entity) => Response::new(entity.to_json()),
            HandlerOutcome::Response(response) => response,
        }
    }
}

impl From<Value> for HandlerOutcome {
    fn from(value: Value) -> Self {
        HandlerOutcome::Value(value)
    }
}

impl From<Response> for HandlerOutcome {
    fn from(response: Response) -> Self {
        HandlerOutcome::Response(response)
    }
}

// Entity payloads hold trait objects, so Debug is written by hand.
impl fmt::Debug for HandlerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOutcome::Value(value) => f.debug_tuple("Value").field(value).finish(),
            HandlerOutcome::Entity(entity) => {
                f.debug_tuple("Entity").field(&entity.to_json()).finish()
            }
            HandlerOutcome::Response(response) => {
                f.debug_tuple("Response").field(response).finish()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Article {
        id: u64,
        title: String,
    }

    impl ApiSerializable for Article {
        fn to_json(&self) -> Value {
            json!({ "id": self.id, "title": self.title })
        }
    }

    #[test]
    fn value_outcome_becomes_200_response() {
        let response = HandlerOutcome::from(json!({"ok": true})).into_response();
        assert_eq!(response.status(), 200);
        assert_eq!(response.data()["ok"], json!(true));
    }

    #[test]
    fn entity_outcome_renders_through_capability() {
        let article = Article {
            id: 7,
            title: "Hello".into(),
        };
        let response = HandlerOutcome::Entity(Box::new(article)).into_response();
        assert_eq!(response.data()["id"], json!(7));
        assert_eq!(response.data()["title"], json!("Hello"));
    }

    #[test]
    fn explicit_response_passes_through() {
        let inner = Response::with_status(json!("created"), 201);
        let response = HandlerOutcome::from(inner).into_response();
        assert_eq!(response.status(), 201);
    }
}
