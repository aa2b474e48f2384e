use rusqlite::{params, Connection};

use super::{now_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{Workbook, WorkbookInput};

pub fn insert_workbook(
    conn: &Connection,
    user_id: i64,
    input: &WorkbookInput,
) -> Result<i64, DatabaseError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO workbooks (user_id, name, description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![user_id, input.name, input.description, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Owner-scoped lookup: `None` both when the workbook is missing and when it
/// belongs to someone else.
pub fn get_workbook_for_owner(
    conn: &Connection,
    id: i64,
    user_id: i64,
) -> Result<Option<Workbook>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, user_id, name, description, created_at, updated_at
         FROM workbooks WHERE id = ?1 AND user_id = ?2",
        params![id, user_id],
        row_to_workbook,
    );
    match result {
        Ok(wb) => Ok(Some(wb)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// A user's workbooks, newest first.
pub fn list_workbooks(conn: &Connection, user_id: i64) -> Result<Vec<Workbook>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, name, description, created_at, updated_at
         FROM workbooks WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![user_id], row_to_workbook)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn update_workbook(
    conn: &Connection,
    id: i64,
    input: &WorkbookInput,
) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE workbooks SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, input.name, input.description, now_timestamp()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Workbook", id));
    }
    Ok(())
}

/// Delete a workbook with its units and problems (FK cascade).
pub fn delete_workbook(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM workbooks WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Workbook", id));
    }
    Ok(())
}

fn row_to_workbook(row: &rusqlite::Row) -> Result<Workbook, rusqlite::Error> {
    let created: String = row.get(4)?;
    let updated: String = row.get(5)?;
    Ok(Workbook {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_problem, insert_unit, list_problems, list_units};
    use crate::db::repository::tests_support::seed_user;
    use crate::db::sqlite::open_memory_database;
    use crate::models::UnitInput;

    fn input(name: &str) -> WorkbookInput {
        WorkbookInput {
            name: name.into(),
            description: String::new(),
        }
    }

    #[test]
    fn insert_and_fetch_for_owner() {
        let conn = open_memory_database().unwrap();
        let owner = seed_user(&conn, "owner");
        let other = seed_user(&conn, "other");
        let id = insert_workbook(&conn, owner, &input("Calculus")).unwrap();

        let wb = get_workbook_for_owner(&conn, id, owner).unwrap().unwrap();
        assert_eq!(wb.name, "Calculus");
        assert!(get_workbook_for_owner(&conn, id, other).unwrap().is_none());
        assert!(get_workbook_for_owner(&conn, id + 100, owner).unwrap().is_none());
    }

    #[test]
    fn list_is_newest_first_and_scoped() {
        let conn = open_memory_database().unwrap();
        let owner = seed_user(&conn, "owner");
        let other = seed_user(&conn, "other");
        insert_workbook(&conn, owner, &input("first")).unwrap();
        insert_workbook(&conn, owner, &input("second")).unwrap();
        insert_workbook(&conn, other, &input("theirs")).unwrap();

        let names: Vec<_> = list_workbooks(&conn, owner)
            .unwrap()
            .into_iter()
            .map(|w| w.name)
            .collect();
        assert_eq!(names, vec!["second", "first"]);
    }

    #[test]
    fn update_changes_name() {
        let conn = open_memory_database().unwrap();
        let owner = seed_user(&conn, "owner");
        let id = insert_workbook(&conn, owner, &input("old")).unwrap();
        update_workbook(
            &conn,
            id,
            &WorkbookInput {
                name: "new".into(),
                description: "desc".into(),
            },
        )
        .unwrap();
        let wb = get_workbook_for_owner(&conn, id, owner).unwrap().unwrap();
        assert_eq!(wb.name, "new");
        assert_eq!(wb.description, "desc");
    }

    #[test]
    fn delete_cascades_to_units_and_problems() {
        let conn = open_memory_database().unwrap();
        let owner = seed_user(&conn, "owner");
        let wb = insert_workbook(&conn, owner, &input("wb")).unwrap();
        let unit = insert_unit(
            &conn,
            wb,
            &UnitInput {
                name: "u".into(),
                description: String::new(),
            },
        )
        .unwrap();
        insert_problem(&conn, unit.id, "img-1").unwrap();
        insert_problem(&conn, unit.id, "img-2").unwrap();

        delete_workbook(&conn, wb).unwrap();

        assert!(list_units(&conn, wb).unwrap().is_empty());
        assert!(list_problems(&conn, unit.id).unwrap().is_empty());
        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM problems", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            delete_workbook(&conn, 9),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
