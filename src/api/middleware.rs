use axum::{extract::Request, http::Method, middleware::Next, response::Response};
use log::{debug, info};
use tower_http::cors::{Any, CorsLayer};

/// Logs every request with its status and latency.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    debug!("{} {}", method, uri);

    let response = next.run(request).await;
    info!(
        "{} {} -> {} in {:?}",
        method,
        uri,
        response.status(),
        start.elapsed()
    );

    response
}

/// Permissive CORS for browser clients.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}
