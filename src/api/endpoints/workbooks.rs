//! Workbook CRUD, scoped to the calling user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, UserContext};
use crate::authorization;
use crate::db::repository;
use crate::models::{Workbook, WorkbookInput};

const MAX_NAME_CHARS: usize = 100;

/// Trim and bound a name/description pair shared by workbooks and units.
pub(crate) fn normalize_input(name: &str, description: &str) -> Result<(String, String), ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("name is required".into()));
    }
    if name.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "name must be at most {MAX_NAME_CHARS} characters"
        )));
    }
    Ok((name.to_string(), description.trim().to_string()))
}

fn validated(input: WorkbookInput) -> Result<WorkbookInput, ApiError> {
    let (name, description) = normalize_input(&input.name, &input.description)?;
    Ok(WorkbookInput { name, description })
}

/// `GET /api/workbooks`: newest first.
pub async fn list(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<Vec<Workbook>>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(repository::list_workbooks(&conn, user.user_id)?))
}

/// `POST /api/workbooks`
pub async fn create(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Json(input): Json<WorkbookInput>,
) -> Result<(StatusCode, Json<Workbook>), ApiError> {
    let input = validated(input)?;
    let conn = ctx.core.open_db()?;
    let id = repository::insert_workbook(&conn, user.user_id, &input)?;
    let workbook = authorization::require_workbook(&conn, user.user_id, id)?;
    tracing::info!(user_id = user.user_id, workbook_id = id, "Workbook created");
    Ok((StatusCode::CREATED, Json(workbook)))
}

/// `GET /api/workbooks/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<Json<Workbook>, ApiError> {
    let conn = ctx.core.open_db()?;
    Ok(Json(authorization::require_workbook(&conn, user.user_id, id)?))
}

/// `PUT /api/workbooks/:id`
pub async fn update(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
    Json(input): Json<WorkbookInput>,
) -> Result<Json<Workbook>, ApiError> {
    let input = validated(input)?;
    let conn = ctx.core.open_db()?;
    authorization::require_workbook(&conn, user.user_id, id)?;
    repository::update_workbook(&conn, id, &input)?;
    Ok(Json(authorization::require_workbook(&conn, user.user_id, id)?))
}

/// `DELETE /api/workbooks/:id`: units and problems go with it.
pub async fn remove(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    authorization::require_workbook(&conn, user.user_id, id)?;
    repository::delete_workbook(&conn, id)?;
    tracing::info!(user_id = user.user_id, workbook_id = id, "Workbook deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed_and_required() {
        let (name, desc) = normalize_input("  대수  ", " memo ").unwrap();
        assert_eq!(name, "대수");
        assert_eq!(desc, "memo");
        assert!(matches!(
            normalize_input("   ", ""),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn overlong_names_are_rejected() {
        let long = "가".repeat(MAX_NAME_CHARS + 1);
        assert!(normalize_input(&long, "").is_err());
        let exact = "가".repeat(MAX_NAME_CHARS);
        assert!(normalize_input(&exact, "").is_ok());
    }
}
