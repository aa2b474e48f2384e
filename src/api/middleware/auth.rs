//! Bearer token authentication middleware.
//!
//! Extracts `Authorization: Bearer <token>`, resolves the token hash to an
//! approved user, and injects `UserContext` into request extensions for
//! downstream handlers.

use axum::http::{HeaderMap, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{hash_token, ApiContext, UserContext};
use crate::db::repository;

/// Require a valid bearer token.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn require_auth(req: Request<axum::body::Body>, next: Next) -> Response {
    match require_auth_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_auth_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let token = bearer_token(req.headers()).ok_or(ApiError::Unauthorized)?;
    let token_hash = hash_token(token);

    // Connection is dropped before the handler runs.
    let user = {
        let conn = ctx.core.open_db()?;
        repository::get_session_user(&conn, &token_hash)?
    };
    let user = user.ok_or_else(|| {
        tracing::debug!("Rejected unknown or revoked bearer token");
        ApiError::Unauthorized
    })?;

    req.extensions_mut().insert(UserContext {
        user_id: user.id,
        username: user.username,
        is_admin: user.is_admin,
        token_hash,
    });

    let mut response = next.run(req).await;
    response
        .headers_mut()
        .insert("Cache-Control", HeaderValue::from_static("no-store"));
    Ok(response)
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
        headers.insert("Authorization", HeaderValue::from_static("Bearer tok123"));
        assert_eq!(bearer_token(&headers), Some("tok123"));
    }
}
