use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use time::{macros::format_description, Date};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{non_empty, submitted, ProfileForm, RegisterForm},
        password::{check_strength, hash_password, verify_password},
        repo_types::{NewUser, User},
    },
    error::AppError,
};

pub(crate) fn is_valid_phone(phone: &str) -> bool {
    lazy_static! {
        static ref PHONE_RE: Regex = Regex::new(r"^09[0-9]{9}$").unwrap();
    }
    PHONE_RE.is_match(phone)
}

pub(crate) fn parse_birthday(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::Validation("Invalid birthday; use YYYY-MM-DD".into()))
}

fn validate_phone(phone: Option<&str>) -> Result<(), AppError> {
    match phone {
        Some(p) if !is_valid_phone(p) => Err(AppError::Validation(
            "Phone number must start with 09 and be exactly 11 digits".into(),
        )),
        _ => Ok(()),
    }
}

/// Create an account. Does not log the new user in.
#[instrument(skip(db, form), fields(username = %form.username.trim()))]
pub async fn register(db: &SqlitePool, form: &RegisterForm) -> Result<User, AppError> {
    let username = form.username.trim();
    let password = form.password.as_str();

    if username.is_empty() || password.is_empty() {
        return Err(AppError::Validation(
            "Username and password are required".into(),
        ));
    }

    check_strength(password).map_err(|msg| AppError::Validation(msg.into()))?;

    if User::find_by_username(db, username).await?.is_some() {
        warn!("username already registered");
        return Err(AppError::Conflict("This username is already taken".into()));
    }

    let phone = submitted(&form.phone);
    validate_phone(phone)?;

    let birthday = non_empty(&form.birthday).map(parse_birthday).transpose()?;

    let hash = hash_password(password)?;
    let new_user = NewUser {
        username,
        password_hash: &hash,
        phone,
        birthday,
        national_id: non_empty(&form.national_id),
    };

    let user = match User::create(db, &new_user).await {
        Ok(u) => u,
        // Lost a race with a concurrent registration of the same name.
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            warn!("username already registered");
            return Err(AppError::Conflict("This username is already taken".into()));
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = user.id, "user registered");
    Ok(user)
}

/// Look up and verify credentials. Unknown users and wrong passwords fail alike.
#[instrument(skip(db, password))]
pub async fn authenticate(
    db: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<User, AppError> {
    let Some(user) = User::find_by_username(db, username.trim()).await? else {
        warn!("login unknown username");
        return Err(AppError::InvalidCredentials);
    };

    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = user.id, "user logged in");
    Ok(user)
}

/// Validate a password change for `user` and return the new hash.
/// New passwords must pass the same strength rule as registration.
/// Persisting it is left to the caller so it can share a statement with
/// other profile changes.
pub fn change_password(
    user: &User,
    current: &str,
    new: &str,
    confirm: &str,
) -> Result<String, AppError> {
    if !verify_password(current, &user.password_hash)? {
        return Err(AppError::Validation("Current password is incorrect".into()));
    }
    if new != confirm {
        return Err(AppError::Validation(
            "New password and confirmation do not match".into(),
        ));
    }
    check_strength(new).map_err(|msg| AppError::Validation(msg.into()))?;
    Ok(hash_password(new)?)
}

#[derive(Debug)]
pub struct ProfileUpdate {
    pub user: User,
    pub password_changed: bool,
}

/// Update phone and, when a new password is given, the password.
/// Nothing is written unless every check passes.
#[instrument(skip(db, form))]
pub async fn update_profile(
    db: &SqlitePool,
    user_id: i64,
    form: &ProfileForm,
) -> Result<ProfileUpdate, AppError> {
    let user = User::find_by_id(db, user_id)
        .await?
        .ok_or(AppError::NotFound)?;

    let phone = submitted(&form.phone);
    validate_phone(phone)?;

    let new_hash = if form.new_password.is_empty() {
        None
    } else {
        Some(change_password(
            &user,
            &form.current_password,
            &form.new_password,
            &form.confirm_password,
        )?)
    };

    let user = User::update_profile(db, user.id, phone, new_hash.as_deref()).await?;
    let password_changed = new_hash.is_some();
    info!(user_id = user.id, password_changed, "profile updated");
    Ok(ProfileUpdate {
        user,
        password_changed,
    })
}
