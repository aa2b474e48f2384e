use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Unit {
    pub id: i64,
    pub workbook_id: i64,
    pub name: String,
    pub description: String,
    /// Dense position within the workbook, assigned as max+1 at creation.
    pub sort_order: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Unit together with its parent workbook name (export headers need both).
#[derive(Debug, Clone, Serialize)]
pub struct UnitWithWorkbook {
    pub unit: Unit,
    pub workbook_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnitInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
