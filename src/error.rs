use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use tracing::error;

use crate::{flash::Flash, views};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad or missing form input.
    #[error("{0}")]
    Validation(String),

    /// Input collides with an existing record (duplicate username).
    #[error("{0}")]
    Conflict(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("login required")]
    Unauthenticated { next: String },

    /// Resource is absent or belongs to another user.
    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(anyhow::Error::new(e))
    }
}

impl AppError {
    /// True for errors that are reported back to the user on the form they came from.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_) | AppError::Conflict(_) | AppError::InvalidCredentials
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(msg) | AppError::Conflict(msg) => {
                (StatusCode::BAD_REQUEST, Html(views::error_page("Bad request", &msg)))
                    .into_response()
            }
            AppError::InvalidCredentials => Flash::error("Invalid username or password")
                .redirect("/login")
                .into_response(),
            AppError::Unauthenticated { next } => {
                let query = serde_urlencoded::to_string([("next", next.as_str())])
                    .unwrap_or_default();
                Flash::error("Please log in first")
                    .redirect(format!("/login?{}", query))
                    .into_response()
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                Html(views::error_page("Not found", "The requested page does not exist.")),
            )
                .into_response(),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html(views::error_page("Server error", "Something went wrong.")),
                )
                    .into_response()
            }
        }
    }
}
