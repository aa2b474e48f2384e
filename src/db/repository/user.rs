use rusqlite::{params, Connection};

use super::{now_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{NewUser, StoredCredentials, User};

const USER_COLUMNS: &str = "id, email, username, is_approved, is_admin, created_at";

pub fn insert_user(conn: &Connection, user: &NewUser) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO users (email, username, password_hash, is_approved, is_admin, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.email,
            user.username,
            user.password_hash,
            user.is_approved as i32,
            user.is_admin as i32,
            now_timestamp(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn count_users(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(count)
}

pub fn email_exists(conn: &Connection, email: &str) -> Result<bool, DatabaseError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )?;
    Ok(exists != 0)
}

pub fn username_exists(conn: &Connection, username: &str) -> Result<bool, DatabaseError> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )?;
    Ok(exists != 0)
}

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], row_to_user);
    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Load a user with its password hash for login.
pub fn get_credentials_by_email(
    conn: &Connection,
    email: &str,
) -> Result<Option<StoredCredentials>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1");
    let result = conn.query_row(&sql, params![email], |row| {
        Ok(StoredCredentials {
            user: row_to_user(row)?,
            password_hash: row.get(6)?,
        })
    });
    match result {
        Ok(creds) => Ok(Some(creds)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Users filtered by approval state, newest first.
pub fn list_users_by_approval(
    conn: &Connection,
    approved: bool,
) -> Result<Vec<User>, DatabaseError> {
    let sql = format!(
        "SELECT {USER_COLUMNS} FROM users WHERE is_approved = ?1 ORDER BY created_at DESC, id DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![approved as i32], row_to_user)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn set_user_approval(
    conn: &Connection,
    id: i64,
    approved: bool,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE users SET is_approved = ?2 WHERE id = ?1",
        params![id, approved as i32],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("User", id));
    }
    Ok(())
}

/// Delete a user. Sessions and workbooks go with it (FK cascade).
pub fn delete_user(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(DatabaseError::not_found("User", id));
    }
    Ok(())
}

fn row_to_user(row: &rusqlite::Row) -> Result<User, rusqlite::Error> {
    let created: String = row.get(5)?;
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        is_approved: row.get::<_, i32>(3)? != 0,
        is_admin: row.get::<_, i32>(4)? != 0,
        created_at: parse_timestamp(&created),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn new_user(name: &str, approved: bool) -> NewUser {
        NewUser {
            email: format!("{name}@example.com"),
            username: name.into(),
            password_hash: "hash".into(),
            is_approved: approved,
            is_admin: false,
        }
    }

    #[test]
    fn insert_and_get_user() {
        let conn = open_memory_database().unwrap();
        let id = insert_user(&conn, &new_user("mina", false)).unwrap();
        let user = get_user(&conn, id).unwrap().unwrap();
        assert_eq!(user.username, "mina");
        assert_eq!(user.email, "mina@example.com");
        assert!(!user.is_approved);
        assert_eq!(count_users(&conn).unwrap(), 1);
    }

    #[test]
    fn duplicate_email_violates_unique() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &new_user("mina", false)).unwrap();
        let mut dup = new_user("other", false);
        dup.email = "mina@example.com".into();
        assert!(insert_user(&conn, &dup).is_err());
        assert!(email_exists(&conn, "mina@example.com").unwrap());
        assert!(username_exists(&conn, "mina").unwrap());
        assert!(!username_exists(&conn, "nobody").unwrap());
    }

    #[test]
    fn credentials_lookup_by_email() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, &new_user("mina", true)).unwrap();
        let creds = get_credentials_by_email(&conn, "mina@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(creds.password_hash, "hash");
        assert!(creds.user.is_approved);
        assert!(get_credentials_by_email(&conn, "x@example.com").unwrap().is_none());
    }

    #[test]
    fn approval_lists_and_toggle() {
        let conn = open_memory_database().unwrap();
        let a = insert_user(&conn, &new_user("a", true)).unwrap();
        let b = insert_user(&conn, &new_user("b", false)).unwrap();
        assert_eq!(list_users_by_approval(&conn, false).unwrap().len(), 1);

        set_user_approval(&conn, b, true).unwrap();
        assert_eq!(list_users_by_approval(&conn, true).unwrap().len(), 2);

        set_user_approval(&conn, a, false).unwrap();
        let pending = list_users_by_approval(&conn, false).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a);
        assert_eq!(list_users_by_approval(&conn, true).unwrap()[0].id, b);
    }

    #[test]
    fn delete_missing_user_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = delete_user(&conn, 42).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
