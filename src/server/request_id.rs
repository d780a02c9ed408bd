//! Request ID middleware.
//!
//! Takes the caller's `x-request-id` when it is a UUID, otherwise generates
//! one. The id is stored in the request extensions, recorded on a tracing
//! span and returned in the response.

use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use cafconvert_core::RequestId;
use tracing::Instrument;

/// Header name used for the request identifier.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Middleware that generates or extracts a request ID.
pub async fn request_id_middleware(
    mut request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<RequestId>().ok())
        .unwrap_or_default();

    request.extensions_mut().insert(id);

    let span = tracing::info_span!("request", request_id = %id);
    let mut response = next.run(request).instrument(span).await;

    if let Ok(val) = HeaderValue::from_str(&id.to_string()) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), val);
    }

    response
}
