use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use genrelay_core::error::GatewayError;
use std::pin::Pin;

/// Wrap an already-framed SSE text stream (each item is a complete
/// `data: ...\n\n` frame, translator-side) into an HTTP response with the
/// right streaming headers. A mid-stream error is logged and ends the
/// stream silently — the client has already received a `200` and a partial
/// body, so there is no status code left to change.
pub fn build_sse_response(stream: Pin<Box<dyn Stream<Item = Result<String, GatewayError>> + Send>>) -> Response {
    let body_stream = futures::StreamExt::map(stream, |item| match item {
        Ok(text) => Ok::<_, std::io::Error>(text.into_bytes()),
        Err(e) => {
            tracing::error!(error = %e, "stream transformation failed mid-flight");
            Ok(b"data: {\"error\":{\"message\":\"stream terminated unexpectedly\"}}\n\n".to_vec())
        }
    });

    let mut response = Response::new(Body::from_stream(body_stream));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    response
}

pub fn error_response(err: GatewayError) -> Response {
    err.into_response()
}
