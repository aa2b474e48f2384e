use chrono::NaiveDateTime;
use serde::Serialize;

/// Account row. The password hash never leaves the repository layer
/// except through `StoredCredentials`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub is_approved: bool,
    pub is_admin: bool,
    pub created_at: NaiveDateTime,
}

/// Credentials loaded for login verification.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub is_approved: bool,
    pub is_admin: bool,
}
