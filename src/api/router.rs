//! HTTP router.
//!
//! Returns a composable `Router` with every endpoint under `/api/` plus the
//! local uploads folder under `/uploads` when images live on disk.
//!
//! Middleware stack on protected routes (outermost → innermost):
//! Extension(ApiContext) → Auth validator → Audit logger → Handler

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::storage::local::UPLOADS_ROUTE;

/// Multipart framing overhead allowed on top of the image size limit.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// Build the application router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.core.config.max_upload_bytes + MULTIPART_OVERHEAD;

    // Layers are applied from bottom (innermost) to top (outermost).
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let protected = Router::new()
        .route("/auth/logout", post(endpoints::auth::logout))
        .route("/auth/me", get(endpoints::auth::me))
        .route(
            "/workbooks",
            get(endpoints::workbooks::list).post(endpoints::workbooks::create),
        )
        .route(
            "/workbooks/:id",
            get(endpoints::workbooks::detail)
                .put(endpoints::workbooks::update)
                .delete(endpoints::workbooks::remove),
        )
        .route(
            "/workbooks/:id/units",
            get(endpoints::units::list).post(endpoints::units::create),
        )
        .route(
            "/units/:id",
            get(endpoints::units::detail)
                .put(endpoints::units::update)
                .delete(endpoints::units::remove),
        )
        .route(
            "/units/:id/problems",
            get(endpoints::problems::list).post(endpoints::problems::create),
        )
        .route(
            "/units/:id/export/problems",
            get(endpoints::exports::problems),
        )
        .route("/units/:id/export/answers", get(endpoints::exports::answers))
        .route(
            "/problems/:id",
            get(endpoints::problems::detail).delete(endpoints::problems::remove),
        )
        .route("/problems/:id/extract", post(endpoints::problems::extract))
        .route("/problems/:id/text", put(endpoints::problems::save_text))
        .route("/problems/:id/answer", post(endpoints::problems::set_answer))
        .route("/admin/users", get(endpoints::admin::users))
        .route("/admin/users/:id/approve", post(endpoints::admin::approve))
        .route("/admin/users/:id/reject", post(endpoints::admin::reject))
        .route("/admin/users/:id/revoke", post(endpoints::admin::revoke))
        .with_state(ctx.clone())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::auth::require_auth))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx.clone()));

    let unprotected = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/auth/register", post(endpoints::auth::register))
        .route("/auth/login", post(endpoints::auth::login))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access));

    let mut app = Router::new()
        .nest("/api", protected)
        .nest("/api", unprotected);

    if ctx.core.serves_local_uploads() {
        let uploads = ServeDir::new(ctx.core.config.uploads_dir());
        app = app.nest_service(
            UPLOADS_ROUTE,
            tower::ServiceBuilder::new()
                .layer(SetResponseHeaderLayer::if_not_present(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .service(uploads),
        );
    }

    app
}
