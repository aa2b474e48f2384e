//! Audit logging middleware.
//!
//! Logs every API request with method, path, response status, latency and
//! the authenticated user when there is one. Runs innermost, after auth has
//! injected `UserContext`.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::api::types::UserContext;

pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let user_id = req.extensions().get::<UserContext>().map(|u| u.user_id);
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, elapsed_ms, user_id, "API request failed");
    } else {
        tracing::info!(%method, %path, status, elapsed_ms, user_id, "API request");
    }
    response
}
