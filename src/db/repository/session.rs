use rusqlite::{params, Connection};

use super::{now_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::User;

pub fn insert_session(
    conn: &Connection,
    token_hash: &str,
    user_id: i64,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created_at) VALUES (?1, ?2, ?3)",
        params![token_hash, user_id, now_timestamp()],
    )?;
    Ok(())
}

/// Resolve a session token hash to its (still approved) user.
pub fn get_session_user(
    conn: &Connection,
    token_hash: &str,
) -> Result<Option<User>, DatabaseError> {
    let result = conn.query_row(
        "SELECT u.id, u.email, u.username, u.is_approved, u.is_admin, u.created_at
         FROM sessions s JOIN users u ON u.id = s.user_id
         WHERE s.token_hash = ?1 AND u.is_approved = 1",
        params![token_hash],
        |row| {
            let created: String = row.get(5)?;
            Ok(User {
                id: row.get(0)?,
                email: row.get(1)?,
                username: row.get(2)?,
                is_approved: row.get::<_, i32>(3)? != 0,
                is_admin: row.get::<_, i32>(4)? != 0,
                created_at: parse_timestamp(&created),
            })
        },
    );
    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Returns whether a session was removed.
pub fn delete_session(conn: &Connection, token_hash: &str) -> Result<bool, DatabaseError> {
    let rows = conn.execute(
        "DELETE FROM sessions WHERE token_hash = ?1",
        params![token_hash],
    )?;
    Ok(rows > 0)
}

pub fn delete_sessions_for_user(conn: &Connection, user_id: i64) -> Result<u64, DatabaseError> {
    let rows = conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
    Ok(rows as u64)
}
