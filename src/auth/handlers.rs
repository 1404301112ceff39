use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
    routing::get,
    Form, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginForm, NextQuery, ProfileForm, RegisterForm},
        repo_types::User,
        services,
        session::{safe_next, CurrentUser, SessionKeys},
    },
    error::AppError,
    flash::{Flash, FlashRedirect, IncomingFlash},
    state::AppState,
    views,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new().route("/profile", get(profile_page).post(update_profile))
}

pub async fn register_page(flash: IncomingFlash) -> views::Page {
    views::register(flash)
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    match services::register(&state.db, &form).await {
        Ok(_) => Ok(Flash::success("Registration complete. You can now log in.")
            .redirect("/login")
            .into_response()),
        Err(e) if e.is_user_facing() => Ok(Flash::error(e.to_string())
            .redirect("/register")
            .into_response()),
        Err(e) => Err(e),
    }
}

pub async fn login_page(flash: IncomingFlash, Query(q): Query<NextQuery>) -> views::Page {
    views::login(flash, &safe_next(q.next.as_deref()))
}

#[instrument(skip(state, form), fields(username = %form.username.trim()))]
pub async fn login(
    State(state): State<AppState>,
    Query(q): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let next = safe_next(q.next.as_deref());

    let user = match services::authenticate(&state.db, &form.username, &form.password).await {
        Ok(u) => u,
        Err(e) if e.is_user_facing() => {
            // Keep the destination so a retry still lands there.
            let back = serde_urlencoded::to_string([("next", next.as_str())])
                .map(|q| format!("/login?{}", q))
                .unwrap_or_else(|_| "/login".into());
            return Ok(Flash::error(e.to_string()).redirect(back).into_response());
        }
        Err(e) => return Err(e),
    };

    let keys = SessionKeys::from_ref(&state);
    let cookie = keys.login_cookie(&user)?;
    Ok(Flash::success("Logged in successfully")
        .redirect(next)
        .with_cookie(cookie)
        .into_response())
}

pub async fn logout(State(state): State<AppState>) -> FlashRedirect {
    let keys = SessionKeys::from_ref(&state);
    info!("user logged out");
    Flash::info("You have been logged out")
        .redirect("/login")
        .with_cookie(keys.logout_cookie())
}

#[instrument(skip(state, flash))]
pub async fn profile_page(
    State(state): State<AppState>,
    current: CurrentUser,
    flash: IncomingFlash,
) -> Result<views::Page, AppError> {
    let user = User::find_by_id(&state.db, current.id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(views::profile(flash, &current, &user))
}

#[instrument(skip(state, form))]
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<ProfileForm>,
) -> Result<Response, AppError> {
    match services::update_profile(&state.db, current.id, &form).await {
        Ok(update) => {
            let msg = if update.password_changed {
                "Profile updated and password changed"
            } else {
                "Profile updated"
            };
            Ok(Flash::success(msg).redirect("/profile").into_response())
        }
        Err(e) if e.is_user_facing() => Ok(Flash::error(e.to_string())
            .redirect("/profile")
            .into_response()),
        Err(e) => Err(e),
    }
}
