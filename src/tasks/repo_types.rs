use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{OffsetDateTime, PrimitiveDateTime};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<PrimitiveDateTime>,
    pub priority: String,
    pub done: bool,
    pub created_at: OffsetDateTime,
    pub user_id: i64,
}

/// Validated user-editable fields of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFields {
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<PrimitiveDateTime>,
    pub priority: String,
}
