//! Database query functions for the `course_sections` table.

use anyhow::{Context, Result};
use sqlx::PgConnection;

use crate::models::{CourseSection, SectionFields};

/// Insert or update the section `(learning_context_id, usage_key)`.
pub async fn upsert_section(
    conn: &mut PgConnection,
    learning_context_id: i64,
    fields: SectionFields<'_>,
) -> Result<CourseSection> {
    let section = sqlx::query_as::<_, CourseSection>(
        "INSERT INTO course_sections \
             (learning_context_id, usage_key, title, ordering, hide_from_toc, visible_to_staff_only) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (learning_context_id, usage_key) DO UPDATE \
         SET title = EXCLUDED.title, \
             ordering = EXCLUDED.ordering, \
             hide_from_toc = EXCLUDED.hide_from_toc, \
             visible_to_staff_only = EXCLUDED.visible_to_staff_only, \
             modified_at = now() \
         RETURNING *",
    )
    .bind(learning_context_id)
    .bind(fields.usage_key)
    .bind(fields.title)
    .bind(fields.ordering)
    .bind(fields.hide_from_toc)
    .bind(fields.visible_to_staff_only)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| format!("failed to upsert section {}", fields.usage_key))?;

    Ok(section)
}

/// Delete every section of the context whose key is not in `keep`.
///
/// Returns the number of rows deleted.
pub async fn delete_sections_except(
    conn: &mut PgConnection,
    learning_context_id: i64,
    keep: &[String],
) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM course_sections \
         WHERE learning_context_id = $1 AND NOT (usage_key = ANY($2))",
    )
    .bind(learning_context_id)
    .bind(keep)
    .execute(&mut *conn)
    .await
    .context("failed to delete stale sections")?;

    Ok(result.rows_affected())
}

/// List the sections of a context ordered by position.
pub async fn list_sections(
    conn: &mut PgConnection,
    learning_context_id: i64,
) -> Result<Vec<CourseSection>> {
    let sections = sqlx::query_as::<_, CourseSection>(
        "SELECT * FROM course_sections WHERE learning_context_id = $1 ORDER BY ordering, id",
    )
    .bind(learning_context_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list sections")?;

    Ok(sections)
}
