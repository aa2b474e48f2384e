//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::authorization::AccessError;
use crate::core_state::CoreError;
use crate::crypto::PasswordError;
use crate::db::DatabaseError;
use crate::export::ExportError;
use crate::storage::StorageError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Account pending approval")]
    PendingApproval,
    #[error("Access denied")]
    Forbidden,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("External service failed: {0}")]
    ExternalService(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
            ),
            ApiError::PendingApproval => (
                StatusCode::FORBIDDEN,
                "PENDING_APPROVAL",
                "Account is waiting for administrator approval".to_string(),
            ),
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Access denied".to_string(),
            ),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::BadRequest(detail) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone())
            }
            ApiError::Conflict(detail) => (StatusCode::CONFLICT, "CONFLICT", detail.clone()),
            ApiError::PayloadTooLarge(detail) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                detail.clone(),
            ),
            ApiError::ExternalService(detail) => {
                tracing::warn!(detail, "External service failure");
                (
                    StatusCode::BAD_GATEWAY,
                    "EXTERNAL_SERVICE",
                    detail.clone(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Denied | AccessError::AdminRequired => ApiError::Forbidden,
            AccessError::Database(e) => e.into(),
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::NotFound { entity_type, id } => {
                ApiError::NotFound(format!("{entity_type} {id} not found"))
            }
            DatabaseError::ConstraintViolation(detail) => ApiError::Conflict(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidExtension(ext) => ApiError::BadRequest(format!(
                "File type not allowed: '{ext}' (png, jpg, jpeg, webp)"
            )),
            StorageError::UnsupportedContent | StorageError::InvalidReference(_) => {
                ApiError::BadRequest(err.to_string())
            }
            StorageError::TooLarge { .. } => ApiError::PayloadTooLarge(err.to_string()),
            StorageError::NotFound(reference) => {
                ApiError::NotFound(format!("Image {reference} not found"))
            }
            StorageError::Upload(_) | StorageError::Fetch(_) | StorageError::Config(_) => {
                ApiError::ExternalService(err.to_string())
            }
            StorageError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn unauthorized_returns_401() {
        let response = ApiError::Unauthorized.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn pending_and_forbidden_are_distinct_403s() {
        let pending = ApiError::PendingApproval.into_response();
        assert_eq!(pending.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(pending).await["error"]["code"], "PENDING_APPROVAL");

        let forbidden = ApiError::Forbidden.into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(forbidden).await["error"]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_json(response).await["error"]["message"],
            "An internal error occurred"
        );
    }

    #[test]
    fn access_errors_map_to_forbidden() {
        assert!(matches!(ApiError::from(AccessError::Denied), ApiError::Forbidden));
        assert!(matches!(
            ApiError::from(AccessError::AdminRequired),
            ApiError::Forbidden
        ));
    }

    #[test]
    fn storage_errors_map_by_category() {
        assert!(matches!(
            ApiError::from(StorageError::TooLarge { size: 3, limit: 2 }),
            ApiError::PayloadTooLarge(_)
        ));
        assert!(matches!(
            ApiError::from(StorageError::InvalidExtension("gif".into())),
            ApiError::BadRequest(_)
        ));
        assert!(matches!(
            ApiError::from(StorageError::Upload("503".into())),
            ApiError::ExternalService(_)
        ));
    }

    #[tokio::test]
    async fn status_codes_for_validation_errors() {
        assert_eq!(
            ApiError::Conflict("dup".into()).into_response().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::PayloadTooLarge("big".into()).into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::ExternalService("down".into()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
