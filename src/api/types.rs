//! Shared types for the API layer.

use std::sync::Arc;

use crate::core_state::CoreState;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// Authenticated caller, injected into request extensions by the auth
/// middleware after the bearer token resolved to an approved user.
#[derive(Debug, Clone)]
pub struct UserContext {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    /// Hash of the presented token, used by logout.
    pub token_hash: String,
}

/// Hash a bearer token with SHA-256, hex encoded. Only the hash is stored.
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a random bearer token (URL-safe base64, 32 bytes of entropy).
pub fn generate_token() -> String {
    use base64::Engine;
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
