use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub completed: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl Task {
    pub async fn create(
        db: &PgPool,
        user_id: i64,
        title: &str,
        completed: bool,
    ) -> anyhow::Result<Task> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (user_id, title, completed)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, title, completed, created_at, updated_at
            "#,
        )
        .bind(user_id)
        .bind(title)
        .bind(completed)
        .fetch_one(db)
        .await?;
        Ok(task)
    }

    pub async fn list_by_user(db: &PgPool, user_id: i64) -> anyhow::Result<Vec<Task>> {
        let rows = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, completed, created_at, updated_at
            FROM tasks
            WHERE user_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    pub async fn find_one(db: &PgPool, id: i64, user_id: i64) -> anyhow::Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            SELECT id, user_id, title, completed, created_at, updated_at
            FROM tasks
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(task)
    }

    /// Partial update; untouched fields keep their value.
    pub async fn update(
        db: &PgPool,
        id: i64,
        user_id: i64,
        title: Option<&str>,
        completed: Option<bool>,
    ) -> anyhow::Result<Option<Task>> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            UPDATE tasks
            SET title = COALESCE($3, title),
                completed = COALESCE($4, completed),
                updated_at = now()
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, title, completed, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(title)
        .bind(completed)
        .fetch_optional(db)
        .await?;
        Ok(task)
    }

    pub async fn delete(db: &PgPool, id: i64, user_id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
