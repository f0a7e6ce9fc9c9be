//! # Server Front-End
//!
//! Owns the process-wide request lifecycle: content negotiation,
//! authentication delegation, dispatch, envelope wrapping, link embedding,
//! serialization, and output, plus the discovery index and the HTTP
//! transport binding.

pub mod core;
pub mod discovery;
pub mod http_server;
pub mod request;
pub mod response;
pub mod service;

pub use self::core::{ApiServer, WireHeaders, WireResponse, MAX_INLINE_HEADERS};
pub use http_server::{HttpServer, ServerHandle};
pub use request::{parse_query_params, parse_raw, RawRequest};
pub use service::AppService;
