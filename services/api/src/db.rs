//! Data Access Layer
//!
//! PostgreSQL implementation of `LearnerStore`. It uses `sqlx` connection
//! pooling and embedded migrations; rows are mapped through small `FromRow`
//! structs because enums are stored as plain text.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pathwise_core::profile::CompletedTopic;
use sqlx::{FromRow, PgPool};

use crate::models::{UpdateUserPayload, User};
use crate::store::LearnerStore;

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    display_name: String,
    email: Option<String>,
    skill_level: String,
    preferred_topics: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            display_name: row.display_name,
            email: row.email,
            skill_level: row.skill_level.parse()?,
            preferred_topics: row.preferred_topics,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ProgressRow {
    topic_id: String,
    topic_name: String,
    category: String,
    score: f64,
    time_spent_minutes: f64,
    difficulty: String,
    completed_at: DateTime<Utc>,
}

impl TryFrom<ProgressRow> for CompletedTopic {
    type Error = anyhow::Error;

    fn try_from(row: ProgressRow) -> Result<Self> {
        Ok(CompletedTopic {
            topic_id: row.topic_id,
            topic_name: row.topic_name,
            category: row.category.parse()?,
            score: row.score,
            time_spent_minutes: row.time_spent_minutes,
            difficulty: row.difficulty.parse()?,
            completed_at: row.completed_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, display_name, email, skill_level, preferred_topics, created_at, updated_at";

impl PgStore {
    /// Creates a new `PgStore` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl LearnerStore for PgStore {
    async fn create_user(&self, user: User) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(&format!(
            "INSERT INTO users (id, display_name, email, skill_level, preferred_topics, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO NOTHING
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.skill_level.as_str())
        .bind(&user.preferred_topics)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert user")?;
        row.map(User::try_from).transpose()
    }

    async fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(User::try_from).transpose()
    }

    async fn update_user(&self, user_id: &str, update: UpdateUserPayload) -> Result<Option<User>> {
        // Read-modify-write inside a transaction keeps the partial update in
        // one place (`UpdateUserPayload::apply`).
        let mut tx = self.pool.begin().await?;

        let row: Option<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut user = User::try_from(row)?;
        update.apply(&mut user);

        sqlx::query(
            "UPDATE users
             SET display_name = $1, email = $2, skill_level = $3, preferred_topics = $4, updated_at = $5
             WHERE id = $6",
        )
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(user.skill_level.as_str())
        .bind(&user.preferred_topics)
        .bind(user.updated_at)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(user))
    }

    async fn add_progress(&self, user_id: &str, entry: &CompletedTopic) -> Result<()> {
        sqlx::query(
            "INSERT INTO progress
                (user_id, topic_id, topic_name, category, score, time_spent_minutes, difficulty, completed_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user_id)
        .bind(&entry.topic_id)
        .bind(&entry.topic_name)
        .bind(entry.category.as_str())
        .bind(entry.score)
        .bind(entry.time_spent_minutes)
        .bind(entry.difficulty.as_str())
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await
        .context("Failed to append progress")?;
        Ok(())
    }

    async fn list_completed_topics(&self, user_id: &str) -> Result<Vec<CompletedTopic>> {
        let rows: Vec<ProgressRow> = sqlx::query_as(
            "SELECT topic_id, topic_name, category, score, time_spent_minutes, difficulty, completed_at
             FROM progress
             WHERE user_id = $1
             ORDER BY completed_at ASC, id ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(CompletedTopic::try_from).collect()
    }
}
