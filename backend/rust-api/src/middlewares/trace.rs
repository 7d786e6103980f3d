use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

#[derive(Clone, Debug)]
pub struct RequestTraceContext {
    pub trace_id: String,
}

/// Reuse the caller-provided trace id when present, otherwise mint one
fn resolve_trace_id(headers: &HeaderMap) -> String {
    headers
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Ensures every request/response pair carries a trace identifier so
/// that log lines can be correlated across services.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let trace_id = resolve_trace_id(request.headers());

    request.extensions_mut().insert(RequestTraceContext {
        trace_id: trace_id.clone(),
    });

    if request.headers().get(TRACE_ID_HEADER).is_none() {
        if let Ok(header_value) = HeaderValue::from_str(&trace_id) {
            request
                .headers_mut()
                .insert(HeaderName::from_static(TRACE_ID_HEADER), header_value);
        }
    }

    let mut response = next.run(request).await;

    if response.headers().get(TRACE_ID_HEADER).is_none() {
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(TRACE_ID_HEADER), value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_incoming_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert(TRACE_ID_HEADER, "abc-123".parse().unwrap());
        assert_eq!(resolve_trace_id(&headers), "abc-123");
    }

    #[test]
    fn mints_trace_id_when_absent() {
        let headers = HeaderMap::new();
        let generated = resolve_trace_id(&headers);
        assert!(Uuid::parse_str(&generated).is_ok());
    }
}
