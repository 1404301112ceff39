use std::time::Duration;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::{debug, warn};

use crate::{
    auth::repo_types::User, config::SessionConfig, cookies, error::AppError, state::AppState,
};

pub const SESSION_COOKIE: &str = "taskbook_session";

/// Session payload stored in the signed cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,         // user ID
    pub username: String, // cached for display
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

#[derive(Clone)]
pub struct SessionKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl FromRef<AppState> for SessionKeys {
    fn from_ref(state: &AppState) -> Self {
        let SessionConfig {
            secret,
            issuer,
            audience,
            ttl_minutes,
            ..
        } = state.config.session.clone();
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            ttl: Duration::from_secs((ttl_minutes.max(1) as u64) * 60),
        }
    }
}

impl SessionKeys {
    pub fn sign(&self, user_id: i64, username: &str) -> anyhow::Result<String> {
        let now = OffsetDateTime::now_utc();
        let exp = now + TimeDuration::seconds(self.ttl.as_secs() as i64);
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id, "session signed");
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> anyhow::Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        debug!(user_id = data.claims.sub, "session verified");
        Ok(data.claims)
    }

    /// `Set-Cookie` value that logs `user` in.
    pub fn login_cookie(&self, user: &User) -> anyhow::Result<String> {
        let token = self.sign(user.id, &user.username)?;
        Ok(cookies::set(
            SESSION_COOKIE,
            &token,
            Some(self.ttl.as_secs() as i64),
        ))
    }

    pub fn logout_cookie(&self) -> String {
        cookies::clear(SESSION_COOKIE)
    }
}

/// The authenticated user behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

/// Resolve the session cookie to a user, or fail with `Unauthenticated`
/// carrying the requested path so login can send the user back there.
pub fn current_user(parts: &Parts, keys: &SessionKeys) -> Result<CurrentUser, AppError> {
    let unauthenticated = || AppError::Unauthenticated {
        next: parts.uri.path().to_string(),
    };

    let token = cookies::read(&parts.headers, SESSION_COOKIE).ok_or_else(unauthenticated)?;

    match keys.verify(token) {
        Ok(claims) => Ok(CurrentUser {
            id: claims.sub,
            username: claims.username,
        }),
        Err(e) => {
            warn!(error = %e, "invalid or expired session");
            Err(unauthenticated())
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = SessionKeys::from_ref(state);
        current_user(parts, &keys)
    }
}

/// Accept only local paths as post-login targets; anything else goes home.
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}
