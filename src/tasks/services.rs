use sqlx::SqlitePool;
use time::{macros::format_description, Date, PrimitiveDateTime, Time};
use tracing::{info, instrument};

use crate::{
    error::AppError,
    tasks::{
        dto::{ListParams, TaskForm},
        repo,
        repo_types::{Task, TaskFields},
    },
};

pub const DEFAULT_PRIORITY: &str = "medium";

/// Parse deadline text as `YYYY-MM-DD HH:MM`, falling back to `YYYY-MM-DD`
/// (midnight). Blank input means no deadline.
pub fn parse_deadline(raw: Option<&str>) -> Result<Option<PrimitiveDateTime>, AppError> {
    let Some(text) = raw.filter(|t| !t.is_empty()) else {
        return Ok(None);
    };

    if let Ok(dt) =
        PrimitiveDateTime::parse(text, format_description!("[year]-[month]-[day] [hour]:[minute]"))
    {
        return Ok(Some(dt));
    }
    Date::parse(text, format_description!("[year]-[month]-[day]"))
        .map(|d| Some(PrimitiveDateTime::new(d, Time::MIDNIGHT)))
        .map_err(|_| AppError::Validation("Invalid deadline; use YYYY-MM-DD or YYYY-MM-DD HH:MM".into()))
}

fn validate(form: &TaskForm) -> Result<TaskFields, AppError> {
    let title = form.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("Title is required".into()));
    }
    let deadline = parse_deadline(form.deadline.as_deref())?;
    let priority = form
        .priority
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PRIORITY);

    Ok(TaskFields {
        title: title.to_string(),
        description: form.description.clone().filter(|d| !d.is_empty()),
        deadline,
        priority: priority.to_string(),
    })
}

#[instrument(skip(db))]
pub async fn list(db: &SqlitePool, user_id: i64, params: &ListParams) -> Result<Vec<Task>, AppError> {
    Ok(repo::list_by_user(db, user_id, params).await?)
}

#[instrument(skip(db, form))]
pub async fn create(db: &SqlitePool, user_id: i64, form: &TaskForm) -> Result<Task, AppError> {
    let fields = validate(form)?;
    let task = repo::insert(db, user_id, &fields).await?;
    info!(task_id = task.id, "task created");
    Ok(task)
}

pub async fn get(db: &SqlitePool, user_id: i64, task_id: i64) -> Result<Task, AppError> {
    repo::find_by_user(db, user_id, task_id)
        .await?
        .ok_or(AppError::NotFound)
}

/// Replace title, description, deadline and priority. A blank deadline
/// clears the stored one.
#[instrument(skip(db, form))]
pub async fn update(
    db: &SqlitePool,
    user_id: i64,
    task_id: i64,
    form: &TaskForm,
) -> Result<Task, AppError> {
    // Ownership first: a foreign task is NotFound even when the form is invalid.
    get(db, user_id, task_id).await?;
    let fields = validate(form)?;
    let task = repo::update_by_user(db, user_id, task_id, &fields)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(task_id, "task updated");
    Ok(task)
}

#[instrument(skip(db))]
pub async fn delete(db: &SqlitePool, user_id: i64, task_id: i64) -> Result<(), AppError> {
    if !repo::delete_by_user(db, user_id, task_id).await? {
        return Err(AppError::NotFound);
    }
    info!("task deleted");
    Ok(())
}

#[instrument(skip(db))]
pub async fn toggle_done(db: &SqlitePool, user_id: i64, task_id: i64) -> Result<Task, AppError> {
    let task = repo::toggle_done_by_user(db, user_id, task_id)
        .await?
        .ok_or(AppError::NotFound)?;
    info!(done = task.done, "task toggled");
    Ok(task)
}
