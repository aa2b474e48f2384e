use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Workbook {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Name/description pair used for both create and edit.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkbookInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}
