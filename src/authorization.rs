//! Ownership authorization for workbooks, units and problems.
//!
//! Every lookup joins up to the owning user and filters by the caller in a
//! single query. A missing entity and an entity owned by someone else are
//! indistinguishable to the caller: both are `AccessError::Denied`.
//! Default-deny.

use rusqlite::Connection;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::{Problem, UnitWithWorkbook, Workbook};

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Entity kinds guarded by ownership, for the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Workbook,
    Unit,
    Problem,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Workbook => "workbook",
            Self::Unit => "unit",
            Self::Problem => "problem",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    #[error("Access denied")]
    Denied,

    #[error("Administrator privileges required")]
    AdminRequired,

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ═══════════════════════════════════════════════════════════
// Checks
// ═══════════════════════════════════════════════════════════

pub fn require_workbook(
    conn: &Connection,
    user_id: i64,
    workbook_id: i64,
) -> Result<Workbook, AccessError> {
    let found = repository::get_workbook_for_owner(conn, workbook_id, user_id)?;
    found.ok_or_else(|| deny(ResourceKind::Workbook, workbook_id, user_id))
}

pub fn require_unit(
    conn: &Connection,
    user_id: i64,
    unit_id: i64,
) -> Result<UnitWithWorkbook, AccessError> {
    let found = repository::get_unit_for_owner(conn, unit_id, user_id)?;
    found.ok_or_else(|| deny(ResourceKind::Unit, unit_id, user_id))
}

pub fn require_problem(
    conn: &Connection,
    user_id: i64,
    problem_id: i64,
) -> Result<Problem, AccessError> {
    let found = repository::get_problem_for_owner(conn, problem_id, user_id)?;
    found.ok_or_else(|| deny(ResourceKind::Problem, problem_id, user_id))
}

/// Admin gate for the approval endpoints.
pub fn require_admin(is_admin: bool, user_id: i64) -> Result<(), AccessError> {
    if is_admin {
        Ok(())
    } else {
        tracing::warn!(user_id, "Admin action refused for non-admin user");
        Err(AccessError::AdminRequired)
    }
}

fn deny(kind: ResourceKind, id: i64, user_id: i64) -> AccessError {
    tracing::warn!(resource = kind.as_str(), id, user_id, "Ownership check denied");
    AccessError::Denied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::tests_support::{seed_unit, seed_user};
    use crate::db::repository::{get_unit, insert_problem};
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn owner_passes_every_level() {
        let conn = open_memory_database().unwrap();
        let owner = seed_user(&conn, "owner");
        let unit_id = seed_unit(&conn, owner);
        let workbook_id = get_unit(&conn, unit_id).unwrap().unwrap().workbook_id;
        let problem = insert_problem(&conn, unit_id, "img").unwrap();

        assert_eq!(require_workbook(&conn, owner, workbook_id).unwrap().id, workbook_id);
        assert_eq!(require_unit(&conn, owner, unit_id).unwrap().unit.id, unit_id);
        assert_eq!(require_problem(&conn, owner, problem.id).unwrap().id, problem.id);
    }

    #[test]
    fn foreign_entities_are_denied() {
        let conn = open_memory_database().unwrap();
        let owner = seed_user(&conn, "owner");
        let intruder = seed_user(&conn, "intruder");
        let unit_id = seed_unit(&conn, owner);
        let workbook_id = get_unit(&conn, unit_id).unwrap().unwrap().workbook_id;
        let problem = insert_problem(&conn, unit_id, "img").unwrap();

        assert!(matches!(
            require_workbook(&conn, intruder, workbook_id),
            Err(AccessError::Denied)
        ));
        assert!(matches!(
            require_unit(&conn, intruder, unit_id),
            Err(AccessError::Denied)
        ));
        assert!(matches!(
            require_problem(&conn, intruder, problem.id),
            Err(AccessError::Denied)
        ));
    }

    #[test]
    fn missing_and_foreign_look_identical() {
        let conn = open_memory_database().unwrap();
        let owner = seed_user(&conn, "owner");
        let intruder = seed_user(&conn, "intruder");
        let unit_id = seed_unit(&conn, owner);
        let problem = insert_problem(&conn, unit_id, "img").unwrap();

        let foreign = require_problem(&conn, intruder, problem.id).unwrap_err();
        let missing = require_problem(&conn, intruder, problem.id + 1000).unwrap_err();
        assert_eq!(foreign.to_string(), missing.to_string());
    }

    #[test]
    fn admin_gate() {
        assert!(require_admin(true, 1).is_ok());
        assert!(matches!(require_admin(false, 2), Err(AccessError::AdminRequired)));
    }

    #[test]
    fn resource_kind_labels() {
        assert_eq!(ResourceKind::Workbook.as_str(), "workbook");
        assert_eq!(ResourceKind::Problem.as_str(), "problem");
    }
}
