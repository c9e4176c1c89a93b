//! Per-request correlation id, generated the way the teacher's trading
//! handlers stamp a `Uuid::new_v4()` onto each response
//! (`api/simple.rs`'s order-submission path) rather than leaving HTTP
//! requests uncorrelated in the logs.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Generates a request id, runs the rest of the stack inside a span that
/// carries it (so every log line for this request is correlated), and
/// echoes it back as a response header for client-side correlation.
pub async fn middleware(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("http_request", %request_id);
    request.extensions_mut().insert(request_id);

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
