//! Database query functions for the `generated_content` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ContentType, GeneratedContent};

/// Parameters for inserting a generation result.
#[derive(Debug, Clone)]
pub struct NewContent {
    pub user_id: Uuid,
    pub content_type: ContentType,
    pub input_params: serde_json::Value,
    pub generated_text: String,
    pub display_title: String,
}

/// Insert a generation result and return the stored row.
pub async fn insert_content(pool: &PgPool, new: &NewContent) -> Result<GeneratedContent> {
    let row = sqlx::query_as::<_, GeneratedContent>(
        "INSERT INTO generated_content \
         (user_id, content_type, input_params, generated_text, display_title) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING *",
    )
    .bind(new.user_id)
    .bind(new.content_type)
    .bind(&new.input_params)
    .bind(&new.generated_text)
    .bind(&new.display_title)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert {} content", new.content_type))?;

    Ok(row)
}

/// List a user's content, newest first, with offset pagination.
pub async fn list_content_for_user(
    pool: &PgPool,
    user_id: Uuid,
    skip: i64,
    limit: i64,
) -> Result<Vec<GeneratedContent>> {
    let rows = sqlx::query_as::<_, GeneratedContent>(
        "SELECT * FROM generated_content \
         WHERE user_id = $1 \
         ORDER BY created_at DESC, id \
         OFFSET $2 LIMIT $3",
    )
    .bind(user_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("failed to list generated content")?;

    Ok(rows)
}

/// Fetch one item, scoped to its owner. Another user's item reads as absent.
pub async fn get_content_for_user(
    pool: &PgPool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<GeneratedContent>> {
    let row = sqlx::query_as::<_, GeneratedContent>(
        "SELECT * FROM generated_content WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch generated content")?;

    Ok(row)
}

/// Count a user's stored items.
pub async fn count_content_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM generated_content WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await
            .context("failed to count generated content")?;

    Ok(count)
}
