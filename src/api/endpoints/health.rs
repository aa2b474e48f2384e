//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub ocr_configured: bool,
    pub storage: &'static str,
}

/// `GET /api/health`: liveness plus which collaborators are wired.
pub async fn check(State(ctx): State<ApiContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::config::APP_VERSION,
        ocr_configured: ctx.core.ocr.is_configured(),
        storage: ctx.core.images.backend(),
    })
}
