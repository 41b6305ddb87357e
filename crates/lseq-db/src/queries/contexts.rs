//! Database query functions for the `learning_contexts` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, Row};

use crate::models::LearningContext;

/// Insert or update the learning context identified by `context_key`.
///
/// Returns the stored row and `true` when the row was newly created.
pub async fn upsert_learning_context(
    conn: &mut PgConnection,
    context_key: &str,
    title: &str,
    published_at: DateTime<Utc>,
    published_version: &str,
) -> Result<(LearningContext, bool)> {
    let row = sqlx::query(
        "INSERT INTO learning_contexts (context_key, title, published_at, published_version) \
         VALUES ($1, $2, $3, $4) \
         ON CONFLICT (context_key) DO UPDATE \
         SET title = EXCLUDED.title, \
             published_at = EXCLUDED.published_at, \
             published_version = EXCLUDED.published_version, \
             modified_at = now() \
         RETURNING *, (xmax = 0) AS inserted",
    )
    .bind(context_key)
    .bind(title)
    .bind(published_at)
    .bind(published_version)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to upsert learning context {context_key}"))?;

    let context = LearningContext::from_row(&row).context("failed to decode learning context")?;
    let inserted: bool = row
        .try_get("inserted")
        .context("failed to decode upsert marker")?;

    Ok((context, inserted))
}

/// Fetch a learning context by its key.
pub async fn get_learning_context(
    conn: &mut PgConnection,
    context_key: &str,
) -> Result<Option<LearningContext>> {
    let context =
        sqlx::query_as::<_, LearningContext>("SELECT * FROM learning_contexts WHERE context_key = $1")
            .bind(context_key)
            .fetch_optional(&mut *conn)
            .await
            .with_context(|| format!("failed to fetch learning context {context_key}"))?;

    Ok(context)
}

/// List all learning contexts, ordered by key.
pub async fn list_learning_contexts(conn: &mut PgConnection) -> Result<Vec<LearningContext>> {
    let contexts =
        sqlx::query_as::<_, LearningContext>("SELECT * FROM learning_contexts ORDER BY context_key")
            .fetch_all(&mut *conn)
            .await
            .context("failed to list learning contexts")?;

    Ok(contexts)
}
