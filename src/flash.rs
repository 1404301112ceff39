//! One-time status messages carried across a redirect.
//!
//! A handler returns a [`FlashRedirect`]; its response stores the message in a
//! short-lived cookie. The next rendered page reads it through
//! [`IncomingFlash`] and clears the cookie.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue},
    response::{IntoResponse, Redirect, Response},
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tracing::warn;

use crate::cookies;

pub const FLASH_COOKIE: &str = "taskbook_flash";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Error,
    Info,
}

impl FlashLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Error => "error",
            FlashLevel::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Error, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashLevel::Info, message)
    }

    pub fn redirect(self, to: impl Into<String>) -> FlashRedirect {
        FlashRedirect {
            to: to.into(),
            flash: Some(self),
            set_cookie: None,
        }
    }

    /// Cookie-safe encoding (`level=...&message=...`).
    pub fn encode(&self) -> Option<String> {
        serde_urlencoded::to_string(self).ok()
    }

    pub fn decode(raw: &str) -> Option<Self> {
        serde_urlencoded::from_str(raw).ok()
    }
}

/// Redirect instruction plus the message to show on the target page.
#[derive(Debug)]
pub struct FlashRedirect {
    pub to: String,
    pub flash: Option<Flash>,
    /// Extra `Set-Cookie` value, used by login and logout for the session cookie.
    pub set_cookie: Option<String>,
}

impl FlashRedirect {
    pub fn with_cookie(mut self, cookie: String) -> Self {
        self.set_cookie = Some(cookie);
        self
    }
}

impl IntoResponse for FlashRedirect {
    fn into_response(self) -> Response {
        let mut res = Redirect::to(&self.to).into_response();
        let headers = res.headers_mut();

        if let Some(cookie) = self.set_cookie {
            match HeaderValue::from_str(&cookie) {
                Ok(v) => {
                    headers.append(header::SET_COOKIE, v);
                }
                Err(e) => warn!(error = %e, "invalid set-cookie value dropped"),
            }
        }

        if let Some(encoded) = self.flash.as_ref().and_then(Flash::encode) {
            let cookie = cookies::set(FLASH_COOKIE, &encoded, Some(60));
            match HeaderValue::from_str(&cookie) {
                Ok(v) => {
                    headers.append(header::SET_COOKIE, v);
                }
                Err(e) => warn!(error = %e, "flash cookie dropped"),
            }
        }
        res
    }
}

/// Flash message waiting for the current request, if any.
#[derive(Debug, Default)]
pub struct IncomingFlash(pub Option<Flash>);

impl IncomingFlash {
    pub fn message(&self) -> Option<&Flash> {
        self.0.as_ref()
    }

    /// `Set-Cookie` value that consumes the message, when there is one to consume.
    pub fn consume_cookie(&self) -> Option<HeaderValue> {
        self.0
            .as_ref()
            .map(|_| HeaderValue::from_str(&cookies::clear(FLASH_COOKIE)))
            .and_then(Result::ok)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for IncomingFlash
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(
            cookies::read(&parts.headers, FLASH_COOKIE).and_then(Flash::decode),
        ))
    }
}
