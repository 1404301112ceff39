use sqlx::SqlitePool;

use crate::db::now_utc;
use crate::tasks::{
    dto::{ListParams, SortBy, SortOrder},
    repo_types::{Task, TaskFields},
};

const TASK_COLUMNS: &str =
    "id, title, description, deadline, priority, done, created_at, user_id";

/// ORDER BY for the list view. Tasks without a deadline always come last.
/// Equal deadlines fall back to ascending id; equal creation times follow id
/// in the requested direction, since ids are assigned in creation order.
fn order_clause(sort: SortBy, order: SortOrder) -> &'static str {
    match (sort, order) {
        (SortBy::Date, SortOrder::Asc) => "created_at ASC, id ASC",
        (SortBy::Date, SortOrder::Desc) => "created_at DESC, id DESC",
        (SortBy::Deadline, SortOrder::Asc) => "deadline IS NULL, deadline ASC, id ASC",
        (SortBy::Deadline, SortOrder::Desc) => "deadline IS NULL, deadline DESC, id ASC",
    }
}

/// Escape LIKE wildcards so the search term matches literally.
fn like_literal(q: &str) -> String {
    let mut out = String::with_capacity(q.len());
    for c in q.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub async fn list_by_user(
    db: &SqlitePool,
    user_id: i64,
    params: &ListParams,
) -> anyhow::Result<Vec<Task>> {
    // LIKE follows SQLite's collation: ASCII letters match regardless of case.
    let sql = format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM tasks
        WHERE user_id = ?1
          AND (?2 IS NULL
               OR title LIKE '%' || ?2 || '%' ESCAPE '\'
               OR description LIKE '%' || ?2 || '%' ESCAPE '\')
        ORDER BY {}
        "#,
        order_clause(params.sort, params.order)
    );
    let rows = sqlx::query_as::<_, Task>(&sql)
        .bind(user_id)
        .bind(params.q.as_deref().map(like_literal))
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn find_by_user(db: &SqlitePool, user_id: i64, task_id: i64) -> anyhow::Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ? AND user_id = ?"
    ))
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(task)
}

pub async fn insert(db: &SqlitePool, user_id: i64, fields: &TaskFields) -> anyhow::Result<Task> {
    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        INSERT INTO tasks (title, description, deadline, priority, done, created_at, user_id)
        VALUES (?, ?, ?, ?, FALSE, ?, ?)
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(&fields.title)
    .bind(fields.description.as_deref())
    .bind(fields.deadline)
    .bind(&fields.priority)
    .bind(now_utc())
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(task)
}

/// Overwrite the editable fields. `None` when the task is not the user's.
pub async fn update_by_user(
    db: &SqlitePool,
    user_id: i64,
    task_id: i64,
    fields: &TaskFields,
) -> anyhow::Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        UPDATE tasks
           SET title = ?, description = ?, deadline = ?, priority = ?
         WHERE id = ? AND user_id = ?
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(&fields.title)
    .bind(fields.description.as_deref())
    .bind(fields.deadline)
    .bind(&fields.priority)
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(task)
}

/// Returns whether a row was removed.
pub async fn delete_by_user(db: &SqlitePool, user_id: i64, task_id: i64) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM tasks WHERE id = ? AND user_id = ?")
        .bind(task_id)
        .bind(user_id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn toggle_done_by_user(
    db: &SqlitePool,
    user_id: i64,
    task_id: i64,
) -> anyhow::Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        UPDATE tasks
           SET done = NOT done
         WHERE id = ? AND user_id = ?
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(task_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(task)
}
