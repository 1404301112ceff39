use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,        // Argon2 hash, never rendered
    pub phone: Option<String>,
    pub birthday: Option<Date>,
    pub national_id: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Validated registration data, ready to insert.
#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    pub birthday: Option<Date>,
    pub national_id: Option<&'a str>,
}
