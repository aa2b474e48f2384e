use rusqlite::{params, Connection};

use super::{now_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{Unit, UnitInput, UnitWithWorkbook};

/// Insert a unit at the end of its workbook (`sort_order = max + 1`).
pub fn insert_unit(
    conn: &Connection,
    workbook_id: i64,
    input: &UnitInput,
) -> Result<Unit, DatabaseError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO units (workbook_id, name, description, sort_order, created_at, updated_at)
         SELECT ?1, ?2, ?3, COALESCE(MAX(sort_order), 0) + 1, ?4, ?4
         FROM units WHERE workbook_id = ?1",
        params![workbook_id, input.name, input.description, now],
    )?;
    let id = conn.last_insert_rowid();
    get_unit(conn, id)?.ok_or_else(|| DatabaseError::not_found("Unit", id))
}

pub fn get_unit(conn: &Connection, id: i64) -> Result<Option<Unit>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id, workbook_id, name, description, sort_order, created_at, updated_at
         FROM units WHERE id = ?1",
        params![id],
        row_to_unit,
    );
    match result {
        Ok(unit) => Ok(Some(unit)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Owner-scoped lookup joined through the parent workbook.
pub fn get_unit_for_owner(
    conn: &Connection,
    id: i64,
    user_id: i64,
) -> Result<Option<UnitWithWorkbook>, DatabaseError> {
    let result = conn.query_row(
        "SELECT u.id, u.workbook_id, u.name, u.description, u.sort_order,
                u.created_at, u.updated_at, w.name
         FROM units u JOIN workbooks w ON w.id = u.workbook_id
         WHERE u.id = ?1 AND w.user_id = ?2",
        params![id, user_id],
        |row| {
            Ok(UnitWithWorkbook {
                unit: row_to_unit(row)?,
                workbook_name: row.get(7)?,
            })
        },
    );
    match result {
        Ok(unit) => Ok(Some(unit)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Units of a workbook in display order.
pub fn list_units(conn: &Connection, workbook_id: i64) -> Result<Vec<Unit>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, workbook_id, name, description, sort_order, created_at, updated_at
         FROM units WHERE workbook_id = ?1 ORDER BY sort_order, id",
    )?;
    let rows = stmt.query_map(params![workbook_id], row_to_unit)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

pub fn update_unit(conn: &Connection, id: i64, input: &UnitInput) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE units SET name = ?2, description = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, input.name, input.description, now_timestamp()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Unit", id));
    }
    Ok(())
}

pub fn delete_unit(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM units WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Unit", id));
    }
    Ok(())
}

fn row_to_unit(row: &rusqlite::Row) -> Result<Unit, rusqlite::Error> {
    let created: String = row.get(5)?;
    let updated: String = row.get(6)?;
    Ok(Unit {
        id: row.get(0)?,
        workbook_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        sort_order: row.get(4)?,
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
    })
}
