use crate::auth::repo_types::{NewUser, User};
use crate::db::now_utc;
use sqlx::SqlitePool;

const USER_COLUMNS: &str =
    "id, username, password_hash, phone, birthday, national_id, created_at";

impl User {
    /// Find a user by username.
    pub async fn find_by_username(db: &SqlitePool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_id(db: &SqlitePool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Insert a new user. Fails with a unique violation if the username is taken.
    pub async fn create(db: &SqlitePool, new: &NewUser<'_>) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, phone, birthday, national_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.phone)
        .bind(new.birthday)
        .bind(new.national_id)
        .bind(now_utc())
        .fetch_one(db)
        .await
    }

    /// Replace the phone number and, when given, the password hash in one statement.
    pub async fn update_profile(
        db: &SqlitePool,
        id: i64,
        phone: Option<&str>,
        password_hash: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
               SET phone = ?,
                   password_hash = COALESCE(?, password_hash)
             WHERE id = ?
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(phone)
        .bind(password_hash)
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
