use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// Logs method, path, status and latency for every request.
///
/// The query string is left out because the WebSocket handshake carries the
/// session token there.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %path,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "request completed"
    );

    response
}
