//! Units inside a workbook.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use super::workbooks::normalize_input;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization;
use crate::db::repository;
use crate::models::{Unit, UnitInput, UnitWithWorkbook};

fn validated(input: UnitInput) -> Result<UnitInput, ApiError> {
    let (name, description) = normalize_input(&input.name, &input.description)?;
    Ok(UnitInput { name, description })
}

/// `GET /api/workbooks/:id/units`: in display order.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(workbook_id): Path<i64>,
) -> Result<Json<Vec<Unit>>, ApiError> {
    let conn = ctx.core.open_db()?;
    authorization::require_workbook(&conn, user.user_id, workbook_id)?;
    Ok(Json(repository::list_units(&conn, workbook_id)?))
}

/// `POST /api/workbooks/:id/units`: appended after the last unit.
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(workbook_id): Path<i64>,
    Json(input): Json<UnitInput>,
) -> Result<(StatusCode, Json<Unit>), ApiError> {
    let input = validated(input)?;
    let conn = ctx.core.open_db()?;
    authorization::require_workbook(&conn, user.user_id, workbook_id)?;
    let unit = repository::insert_unit(&conn, workbook_id, &input)?;
    tracing::info!(
        user_id = user.user_id,
        workbook_id,
        unit_id = unit.id,
        sort_order = unit.sort_order,
        "Unit created"
    );
    Ok((StatusCode::CREATED, Json(unit)))
}

/// `GET /api/units/:id`: includes the parent workbook name.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<Json<UnitWithWorkbook>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(authorization::require_unit(&conn, user.user_id, id)?))
}

/// `PUT /api/units/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
    Json(input): Json<UnitInput>,
) -> Result<Json<Unit>, ApiError> {
    let input = validated(input)?;
    let conn = ctx.core.open_db()?;
    authorization::require_unit(&conn, user.user_id, id)?;
    repository::update_unit(&conn, id, &input)?;
    let updated = authorization::require_unit(&conn, user.user_id, id)?;
    Ok(Json(updated.unit))
}

/// `DELETE /api/units/:id`
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    authorization::require_unit(&conn, user.user_id, id)?;
    repository::delete_unit(&conn, id)?;
    tracing::info!(user_id = user.user_id, unit_id = id, "Unit deleted");
    Ok(StatusCode::NO_CONTENT)
}
