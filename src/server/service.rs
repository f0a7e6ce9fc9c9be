use super::core::ApiServer;
use super::request::parse_raw;
use super::response::write_wire_response;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;

/// The HTTP binding: adapts raw connections onto [`ApiServer::serve`].
///
/// The server itself is immutable once constructed, so the service is a
/// cheap `Arc` handle cloned per connection.
#[derive(Clone)]
pub struct AppService {
    server: Arc<ApiServer>,
}

impl AppService {
    #[must_use]
    pub fn new(server: Arc<ApiServer>) -> Self {
        Self { server }
    }

    #[must_use]
    pub fn server(&self) -> &Arc<ApiServer> {
        &self.server
    }
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let raw = parse_raw(req);
        let wire = self.server.serve(raw);
        write_wire_response(res, wire);
        Ok(())
    }
}
