//! Request ID middleware for request tracing and correlation.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Span;
use uuid::Uuid;

/// The HTTP header name for request IDs.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Longest upstream ID we accept before generating our own.
const MAX_UPSTREAM_LEN: usize = 128;

/// Middleware that ensures every request has a unique request ID.
///
/// Keeps an upstream `x-request-id`, otherwise generates a UUID v4, and
/// echoes it in the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .filter(|h| !h.is_empty() && h.len() <= MAX_UPSTREAM_LEN)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(request_id) = request_id else {
        return next.run(request).await;
    };

    let id = request_id.to_str().unwrap_or_default().to_owned();
    Span::current().record("request_id", id.as_str());
    sentry::configure_scope(|scope| {
        scope.set_tag("request_id", &id);
    });

    request
        .headers_mut()
        .insert(REQUEST_ID_HEADER, request_id.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}
