//! Repository layer: entity-scoped database operations.
//!
//! Every function takes a borrowed `Connection`; callers own the connection
//! for the lifetime of one request.

mod problem;
mod session;
mod unit;
mod user;
mod workbook;

use chrono::NaiveDateTime;

pub use problem::*;
pub use session::*;
pub use unit::*;
pub use user::*;
pub use workbook::*;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn now_timestamp() -> String {
    chrono::Local::now()
        .naive_local()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

pub(crate) fn parse_timestamp(raw: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests_support {
    use rusqlite::Connection;

    use super::{insert_unit, insert_user, insert_workbook};
    use crate::models::{NewUser, UnitInput, WorkbookInput};

    pub fn seed_user(conn: &Connection, name: &str) -> i64 {
        insert_user(
            conn,
            &NewUser {
                email: format!("{name}@example.com"),
                username: name.into(),
                password_hash: "hash".into(),
                is_approved: true,
                is_admin: false,
            },
        )
        .unwrap()
    }

    /// Fresh workbook with one unit; returns the unit id.
    pub fn seed_unit(conn: &Connection, user_id: i64) -> i64 {
        let wb = insert_workbook(
            conn,
            user_id,
            &WorkbookInput {
                name: "wb".into(),
                description: String::new(),
            },
        )
        .unwrap();
        insert_unit(
            conn,
            wb,
            &UnitInput {
                name: "unit".into(),
                description: String::new(),
            },
        )
        .unwrap()
        .id
    }
}
