use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User record in the database.
///
/// A user always has at least one of `password_hash` / `google_id` after
/// registration; `refresh_token` holds the single currently valid refresh
/// token, or NULL when logged out.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Fields for creating a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub email_verified: bool,
}

/// Narrow persistence seam for user records.
///
/// Single-record atomicity only; no cross-user transactions are assumed.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_google_id(&self, google_id: &str) -> anyhow::Result<Option<User>>;
    async fn create(&self, new: NewUser) -> anyhow::Result<User>;
    /// Overwrite the stored refresh token; `None` clears it.
    async fn update_refresh_token(&self, id: i64, refresh_token: Option<&str>)
        -> anyhow::Result<()>;
    async fn update_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()>;
    /// Attach a google identity to an existing account and mark the email
    /// verified. Returns the updated record.
    async fn link_google_account(
        &self,
        id: i64,
        google_id: &str,
        picture: Option<&str>,
    ) -> anyhow::Result<User>;
}

const USER_COLUMNS: &str = "id, email, password_hash, google_id, name, picture, \
                            email_verified, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_google_id(&self, google_id: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = $1"
        ))
        .bind(google_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (email, password_hash, google_id, name, picture, email_verified)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.google_id)
        .bind(&new.name)
        .bind(&new.picture)
        .bind(new.email_verified)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_refresh_token(
        &self,
        id: i64,
        refresh_token: Option<&str>,
    ) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(refresh_token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn link_google_account(
        &self,
        id: i64,
        google_id: &str,
        picture: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET google_id = $2,
                picture = COALESCE($3, picture),
                email_verified = TRUE,
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(google_id)
        .bind(picture)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }
}
