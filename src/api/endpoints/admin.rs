//! Account approval for administrators.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization;
use crate::db::repository;
use crate::models::User;

#[derive(Debug, Serialize)]
pub struct UserLists {
    pub pending: Vec<User>,
    pub approved: Vec<User>,
}

/// `GET /api/admin/users`
pub async fn users(
    State(ctx): State<ApiContext>,
    Extension(admin): Extension<UserContext>,
) -> Result<Json<UserLists>, ApiError> {
    authorization::require_admin(admin.is_admin, admin.user_id)?;
    let conn = ctx.core.open_db()?;
    Ok(Json(UserLists {
        pending: repository::list_users_by_approval(&conn, false)?,
        approved: repository::list_users_by_approval(&conn, true)?,
    }))
}

/// `POST /api/admin/users/:id/approve`
pub async fn approve(
    State(ctx): State<ApiContext>,
    Extension(admin): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    authorization::require_admin(admin.is_admin, admin.user_id)?;
    let conn = ctx.core.open_db()?;
    repository::set_user_approval(&conn, id, true)?;
    let user = repository::get_user(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))?;
    tracing::info!(admin_id = admin.user_id, user_id = id, "User approved");
    Ok(Json(user))
}

/// `POST /api/admin/users/:id/reject`: deletes the account.
pub async fn reject(
    State(ctx): State<ApiContext>,
    Extension(admin): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    authorization::require_admin(admin.is_admin, admin.user_id)?;
    if id == admin.user_id {
        return Err(ApiError::BadRequest("Cannot reject your own account".into()));
    }
    let conn = ctx.core.open_db()?;
    repository::delete_user(&conn, id)?;
    tracing::info!(admin_id = admin.user_id, user_id = id, "User rejected");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/admin/users/:id/revoke`: back to pending, sessions dropped.
pub async fn revoke(
    State(ctx): State<ApiContext>,
    Extension(admin): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    authorization::require_admin(admin.is_admin, admin.user_id)?;
    if id == admin.user_id {
        return Err(ApiError::BadRequest("Cannot revoke your own approval".into()));
    }
    let conn = ctx.core.open_db()?;
    repository::set_user_approval(&conn, id, false)?;
    let dropped = repository::delete_sessions_for_user(&conn, id)?;
    let user = repository::get_user(&conn, id)?
        .ok_or_else(|| ApiError::NotFound(format!("User {id} not found")))?;
    tracing::info!(
        admin_id = admin.user_id,
        user_id = id,
        sessions = dropped,
        "User approval revoked"
    );
    Ok(Json(user))
}
