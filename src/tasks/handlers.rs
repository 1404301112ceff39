use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Router,
};
use tracing::instrument;

use crate::{
    auth::session::{safe_next, CurrentUser},
    error::AppError,
    flash::{Flash, IncomingFlash},
    state::AppState,
    tasks::{
        dto::{ListParams, ListQuery, TaskForm},
        services,
    },
    views,
};

// --- public routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/todo/:id", get(task_detail))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/todo/create", get(create_page).post(create_task))
        .route("/todo/:id/edit", get(edit_page).post(edit_task))
        .route("/todo/:id/delete", post(delete_task))
        .route("/todo/:id/toggle", post(toggle_task))
}

// --- handlers ---

/// Non-numeric ids cannot name a task.
fn parse_id(raw: &str) -> Result<i64, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// Local path of the `Referer` header, if it has one.
fn referer_path(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Uri>().ok())
        .and_then(|uri| uri.path_and_query().map(|pq| pq.as_str().to_string()))
}

#[instrument(skip(state, flash))]
pub async fn list_tasks(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: IncomingFlash,
    Query(query): Query<ListQuery>,
) -> Result<views::Page, AppError> {
    let params = ListParams::from(&query);
    let tasks = services::list(&state.db, user.id, &params).await?;
    Ok(views::task_list(flash, &user, &tasks, &params))
}

#[instrument(skip(state, flash))]
pub async fn task_detail(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<String>,
) -> Result<views::Page, AppError> {
    let task = services::get(&state.db, user.id, parse_id(&id)?).await?;
    Ok(views::task_detail(flash, &user, &task))
}

pub async fn create_page(user: CurrentUser, flash: IncomingFlash) -> views::Page {
    views::task_form(flash, &user, None)
}

#[instrument(skip(state, form))]
pub async fn create_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<TaskForm>,
) -> Result<Response, AppError> {
    match services::create(&state.db, user.id, &form).await {
        Ok(_) => Ok(Flash::success("Task created").redirect("/").into_response()),
        Err(e) if e.is_user_facing() => Ok(Flash::error(e.to_string())
            .redirect("/todo/create")
            .into_response()),
        Err(e) => Err(e),
    }
}

#[instrument(skip(state, flash))]
pub async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    flash: IncomingFlash,
    Path(id): Path<String>,
) -> Result<views::Page, AppError> {
    let task = services::get(&state.db, user.id, parse_id(&id)?).await?;
    Ok(views::task_form(flash, &user, Some(&task)))
}

#[instrument(skip(state, form))]
pub async fn edit_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Form(form): Form<TaskForm>,
) -> Result<Response, AppError> {
    let id = parse_id(&id)?;
    match services::update(&state.db, user.id, id, &form).await {
        Ok(task) => Ok(Flash::success("Task updated")
            .redirect(format!("/todo/{}", task.id))
            .into_response()),
        Err(e) if e.is_user_facing() => Ok(Flash::error(e.to_string())
            .redirect(format!("/todo/{}/edit", id))
            .into_response()),
        Err(e) => Err(e),
    }
}

#[instrument(skip(state))]
pub async fn delete_task(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    services::delete(&state.db, user.id, parse_id(&id)?).await?;
    Ok(Flash::success("Task deleted").redirect("/").into_response())
}

#[instrument(skip(state, headers))]
pub async fn toggle_task(
    State(state): State<AppState>,
    user: CurrentUser,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    services::toggle_done(&state.db, user.id, parse_id(&id)?).await?;
    let back = safe_next(referer_path(&headers).as_deref());
    Ok(Flash::success("Task status changed").redirect(back).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_id("12").unwrap(), 12);
        assert!(matches!(parse_id("abc"), Err(AppError::NotFound)));
        assert!(matches!(parse_id(""), Err(AppError::NotFound)));
    }

    #[test]
    fn referer_reduced_to_local_path() {
        let mut headers = HeaderMap::new();
        assert_eq!(referer_path(&headers), None);

        headers.insert(
            header::REFERER,
            HeaderValue::from_static("http://localhost:8080/?q=milk&sort=date"),
        );
        assert_eq!(referer_path(&headers).as_deref(), Some("/?q=milk&sort=date"));

        headers.insert(header::REFERER, HeaderValue::from_static("https://evil.example/todo/1"));
        assert_eq!(safe_next(referer_path(&headers).as_deref()), "/todo/1");
    }
}
