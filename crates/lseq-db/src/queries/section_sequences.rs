//! Database query functions for the `course_section_sequences` join table.

use anyhow::{Context, Result};
use sqlx::PgConnection;

use crate::models::{CourseSectionSequence, PlacementFields, SectionSequenceEntry};

/// Delete every join row of a context. Returns the number of rows deleted.
pub async fn delete_for_context(conn: &mut PgConnection, learning_context_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM course_section_sequences WHERE learning_context_id = $1")
        .bind(learning_context_id)
        .execute(&mut *conn)
        .await
        .context("failed to delete section sequences")?;

    Ok(result.rows_affected())
}

/// Insert one join row placing a sequence inside a section.
pub async fn insert_section_sequence(
    conn: &mut PgConnection,
    learning_context_id: i64,
    placement: PlacementFields,
) -> Result<CourseSectionSequence> {
    let row = sqlx::query_as::<_, CourseSectionSequence>(
        "INSERT INTO course_section_sequences \
             (learning_context_id, section_id, sequence_id, ordering, hide_from_toc, visible_to_staff_only) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING *",
    )
    .bind(learning_context_id)
    .bind(placement.section_id)
    .bind(placement.sequence_id)
    .bind(placement.ordering)
    .bind(placement.hide_from_toc)
    .bind(placement.visible_to_staff_only)
    .fetch_one(&mut *conn)
    .await
    .with_context(|| {
        format!(
            "failed to insert section sequence (section {}, sequence {})",
            placement.section_id, placement.sequence_id
        )
    })?;

    Ok(row)
}

/// List a context's join rows with their sequences, ordered by position
/// within the owning section.
pub async fn list_entries(
    conn: &mut PgConnection,
    learning_context_id: i64,
) -> Result<Vec<SectionSequenceEntry>> {
    let entries = sqlx::query_as::<_, SectionSequenceEntry>(
        "SELECT css.section_id, css.ordering, css.hide_from_toc, css.visible_to_staff_only, \
                seq.usage_key AS sequence_usage_key, seq.title AS sequence_title \
         FROM course_section_sequences css \
         JOIN learning_sequences seq ON seq.id = css.sequence_id \
         WHERE css.learning_context_id = $1 \
         ORDER BY css.ordering, css.section_id",
    )
    .bind(learning_context_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list section sequences")?;

    Ok(entries)
}

/// List the raw join rows of a context, grouped by section.
pub async fn list_section_sequences(
    conn: &mut PgConnection,
    learning_context_id: i64,
) -> Result<Vec<CourseSectionSequence>> {
    let rows = sqlx::query_as::<_, CourseSectionSequence>(
        "SELECT * FROM course_section_sequences \
         WHERE learning_context_id = $1 \
         ORDER BY section_id, ordering",
    )
    .bind(learning_context_id)
    .fetch_all(&mut *conn)
    .await
    .context("failed to list raw section sequences")?;

    Ok(rows)
}
