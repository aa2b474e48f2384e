//! Account endpoints: registration, login, logout, current user.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::{generate_token, hash_token, ApiContext, UserContext};
use crate::crypto;
use crate::db::{repository, DatabaseError};
use crate::models::{NewUser, User};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    #[serde(default)]
    pub agree_terms: bool,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user: User,
    /// Whether the account must wait for an administrator.
    pub pending_approval: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// `POST /api/auth/register`
///
/// The very first account becomes an approved administrator; everyone after
/// waits for approval.
pub async fn register(
    State(ctx): State<ApiContext>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_lowercase();

    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest(
            "username, email and password are required".into(),
        ));
    }
    if !req.agree_terms {
        return Err(ApiError::BadRequest("Terms of use must be accepted".into()));
    }
    if req.password != req.confirm_password {
        return Err(ApiError::BadRequest("Passwords do not match".into()));
    }

    {
        let conn = ctx.core.open_db()?;
        if repository::email_exists(&conn, &email)? {
            return Err(ApiError::Conflict("Email is already registered".into()));
        }
        if repository::username_exists(&conn, &username)? {
            return Err(ApiError::Conflict("Username is already taken".into()));
        }
    }

    let iterations = ctx.core.config.password_iterations;
    let password = req.password;
    let password_hash =
        tokio::task::spawn_blocking(move || crypto::hash_password_with(&password, iterations))
            .await?;

    let conn = ctx.core.open_db()?;
    let first_user = repository::count_users(&conn)? == 0;
    let id = repository::insert_user(
        &conn,
        &NewUser {
            email,
            username,
            password_hash,
            is_approved: first_user,
            is_admin: first_user,
        },
    )
    .map_err(|e| match e {
        // Lost a race against a concurrent registration.
        DatabaseError::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            ApiError::Conflict("Email or username is already registered".into())
        }
        other => other.into(),
    })?;
    let user = repository::get_user(&conn, id)?
        .ok_or_else(|| ApiError::Internal(format!("user {id} vanished after insert")))?;

    tracing::info!(user_id = id, admin = first_user, "Account registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            pending_approval: !user.is_approved,
            user,
        }),
    ))
}

/// `POST /api/auth/login`: verify credentials and issue a bearer token.
pub async fn login(
    State(ctx): State<ApiContext>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    if email.is_empty() || req.password.is_empty() {
        return Err(ApiError::BadRequest("email and password are required".into()));
    }

    let creds = {
        let conn = ctx.core.open_db()?;
        repository::get_credentials_by_email(&conn, &email)?
    };
    let Some(creds) = creds else {
        tracing::info!("Login failed: unknown email");
        return Err(ApiError::Unauthorized);
    };

    let password = req.password;
    let stored = creds.password_hash.clone();
    let valid =
        tokio::task::spawn_blocking(move || crypto::verify_password(&password, &stored)).await??;
    if !valid {
        tracing::info!(user_id = creds.user.id, "Login failed: wrong password");
        return Err(ApiError::Unauthorized);
    }
    if !creds.user.is_approved {
        return Err(ApiError::PendingApproval);
    }

    let token = generate_token();
    let conn = ctx.core.open_db()?;
    repository::insert_session(&conn, &hash_token(&token), creds.user.id)?;

    tracing::info!(user_id = creds.user.id, "Login succeeded");
    Ok(Json(LoginResponse {
        token,
        user: creds.user,
    }))
}

/// `POST /api/auth/logout`: revoke the presented token.
pub async fn logout(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<StatusCode, ApiError> {
    let conn = ctx.core.open_db()?;
    repository::delete_session(&conn, &user.token_hash)?;
    tracing::info!(user_id = user.user_id, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/auth/me`
pub async fn me(
    State(ctx): State<ApiContext>,
    Extension(user): Extension<UserContext>,
) -> Result<Json<User>, ApiError> {
    let conn = ctx.core.open_db()?;
    let found = repository::get_user(&conn, user.user_id)?.ok_or(ApiError::Unauthorized)?;
    Ok(Json(found))
}
