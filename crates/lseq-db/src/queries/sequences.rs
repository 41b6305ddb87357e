//! Database query functions for the `learning_sequences` table.

use anyhow::{Context, Result};
use sqlx::PgConnection;

use crate::models::LearningSequence;

/// Insert or update the sequence `(learning_context_id, usage_key)`.
pub async fn upsert_sequence(
    conn: &mut PgConnection,
    learning_context_id: i64,
    usage_key: &str,
    title: &str,
) -> Result<LearningSequence> {
    let sequence = sqlx::query_as::<_, LearningSequence>(
        "INSERT INTO learning_sequences (learning_context_id, usage_key, title) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (learning_context_id, usage_key) DO UPDATE \
         SET title = EXCLUDED.title, modified_at = now() \
         RETURNING *",
    )
    .bind(learning_context_id)
    .bind(usage_key)
    .bind(title)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to upsert sequence {usage_key}"))?;

    Ok(sequence)
}

/// Delete every sequence of the context whose key is not in `keep`.
///
/// Returns the number of rows deleted.
pub async fn delete_sequences_except(
    conn: &mut PgConnection,
    learning_context_id: i64,
    keep: &[String],
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM learning_sequences \
         WHERE learning_context_id = $1 AND NOT (usage_key = ANY($2))",
    )
    .bind(learning_context_id)
    .bind(keep)
    .execute(&mut *conn)
    .await
    .context("failed to delete stale sequences")?;

    Ok(result.rows_affected())
}

/// List the sequences of a context ordered by key.
pub async fn list_sequences(
    conn: &mut PgConnection,
    learning_context_id: i64,
) -> Result<Vec<LearningSequence>> {
    let sequences = sqlx::query_as::<_, LearningSequence>(
        "SELECT * FROM learning_sequences WHERE learning_context_id = $1 ORDER BY usage_key",
    )
    .bind(learning_context_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list sequences")?;

    Ok(sequences)
}
