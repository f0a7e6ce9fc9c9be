use super::core::WireResponse;
use may_minihttp::Response as HttpResponse;

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        410 => "Gone",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Write an assembled wire response out through may_minihttp.
pub fn write_wire_response(res: &mut HttpResponse, wire: WireResponse) {
    res.status_code(wire.status as usize, status_reason(wire.status));
    for (name, value) in &wire.headers {
        // may_minihttp keeps header lines as &'static str; per-response
        // header churn is small enough that leaking the line is acceptable.
        let line = format!("{name}: {value}").into_boxed_str();
        res.header(Box::leak(line));
    }
    if let Some(body) = wire.body {
        res.body_vec(body.into_bytes());
    }
}
