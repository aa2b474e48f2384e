use rusqlite::{params, Connection};

use super::{now_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{Answer, Problem};

const PROBLEM_COLUMNS: &str = "p.id, p.unit_id, p.problem_image, p.problem_text, \
     p.is_text_extracted, p.answer_image, p.answer_text, p.has_answer, \
     p.problem_number, p.created_at, p.updated_at";

/// Insert a problem at the end of its unit (`problem_number = max + 1`).
pub fn insert_problem(
    conn: &Connection,
    unit_id: i64,
    image_ref: &str,
) -> Result<Problem, DatabaseError> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO problems (unit_id, problem_image, problem_number, created_at, updated_at)
         SELECT ?1, ?2, COALESCE(MAX(problem_number), 0) + 1, ?3, ?3
         FROM problems WHERE unit_id = ?1",
        params![unit_id, image_ref, now],
    )?;
    let id = conn.last_insert_rowid();
    get_problem(conn, id)?.ok_or_else(|| DatabaseError::not_found("Problem", id))
}

pub fn get_problem(conn: &Connection, id: i64) -> Result<Option<Problem>, DatabaseError> {
    let sql = format!("SELECT {PROBLEM_COLUMNS} FROM problems p WHERE p.id = ?1");
    let result = conn.query_row(&sql, params![id], row_to_problem);
    match result {
        Ok(problem) => Ok(Some(problem)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Owner-scoped lookup joined through unit and workbook.
pub fn get_problem_for_owner(
    conn: &Connection,
    id: i64,
    user_id: i64,
) -> Result<Option<Problem>, DatabaseError> {
    let sql = format!(
        "SELECT {PROBLEM_COLUMNS}
         FROM problems p
         JOIN units u ON u.id = p.unit_id
         JOIN workbooks w ON w.id = u.workbook_id
         WHERE p.id = ?1 AND w.user_id = ?2"
    );
    let result = conn.query_row(&sql, params![id, user_id], row_to_problem);
    match result {
        Ok(problem) => Ok(Some(problem)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Problems of a unit ordered by number.
pub fn list_problems(conn: &Connection, unit_id: i64) -> Result<Vec<Problem>, DatabaseError> {
    let sql = format!(
        "SELECT {PROBLEM_COLUMNS} FROM problems p
         WHERE p.unit_id = ?1 ORDER BY p.problem_number, p.id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![unit_id], row_to_problem)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
}

/// Store (possibly edited) OCR text and mark the problem as extracted.
pub fn save_problem_text(conn: &Connection, id: i64, text: &str) -> Result<(), DatabaseError> {
    let rows = conn.execute(
        "UPDATE problems SET problem_text = ?2, is_text_extracted = 1, updated_at = ?3
         WHERE id = ?1",
        params![id, text, now_timestamp()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Problem", id));
    }
    Ok(())
}

/// Replace the answer. An image answer clears the text one and vice versa.
pub fn set_answer(conn: &Connection, id: i64, answer: &Answer) -> Result<(), DatabaseError> {
    let (image, text) = match answer {
        Answer::Image(reference) => (Some(reference.as_str()), None),
        Answer::Text(text) => (None, Some(text.as_str())),
    };
    let rows = conn.execute(
        "UPDATE problems SET answer_image = ?2, answer_text = ?3, has_answer = 1, updated_at = ?4
         WHERE id = ?1",
        params![id, image, text, now_timestamp()],
    )?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Problem", id));
    }
    Ok(())
}

pub fn delete_problem(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let rows = conn.execute("DELETE FROM problems WHERE id = ?1", params![id])?;
    if rows == 0 {
        return Err(DatabaseError::not_found("Problem", id));
    }
    Ok(())
}

fn row_to_problem(row: &rusqlite::Row) -> Result<Problem, rusqlite::Error> {
    let created: String = row.get(9)?;
    let updated: String = row.get(10)?;
    Ok(Problem {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        problem_image: row.get(2)?,
        problem_text: row.get(3)?,
        is_text_extracted: row.get::<_, i32>(4)? != 0,
        answer_image: row.get(5)?,
        answer_text: row.get(6)?,
        has_answer: row.get::<_, i32>(7)? != 0,
        problem_number: row.get(8)?,
        created_at: parse_timestamp(&created),
        updated_at: parse_timestamp(&updated),
    })
}
