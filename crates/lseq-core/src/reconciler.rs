//! Outline reconciler: atomically replaces the stored projection of one
//! course with a new snapshot.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, instrument};

use lseq_db::models::{PlacementFields, SectionFields};
use lseq_db::queries::{contexts, section_sequences, sections, sequences};

use crate::data::CourseOutlineData;
use crate::error::{OutlineError, Result};
use crate::reader::ensure_supported;

/// What one reconciliation wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub learning_context_id: i64,
    /// The learning context did not exist before.
    pub created: bool,
    pub sections_written: usize,
    pub sections_deleted: u64,
    pub sequences_written: usize,
    pub sequences_deleted: u64,
    pub placements_written: usize,
}

/// Replace everything stored for `outline.course_key` with `outline`.
///
/// All writes happen in one transaction; on any error nothing is applied.
/// Two reconciliations of the same course serialize on the learning context
/// row and the last to commit wins.
#[instrument(skip_all, fields(course_key = %outline.course_key))]
pub async fn replace_course_outline(
    pool: &PgPool,
    outline: &CourseOutlineData,
) -> Result<ReconcileSummary> {
    ensure_supported(&outline.course_key)?;
    outline.validate()?;

    let mut tx = pool
        .begin()
        .await
        .map_err(OutlineError::sqlx("failed to begin transaction"))?;

    // Dropping `tx` on error rolls everything back.
    let summary = apply(&mut tx, outline).await?;

    tx.commit()
        .await
        .map_err(OutlineError::sqlx("failed to commit course outline"))?;

    info!(
        sections = summary.sections_written,
        sequences = summary.sequences_written,
        placements = summary.placements_written,
        version = %outline.published_version,
        "course outline replaced"
    );
    Ok(summary)
}

async fn apply(conn: &mut PgConnection, outline: &CourseOutlineData) -> Result<ReconcileSummary> {
    let course_key = outline.course_key.to_string();

    // 1. Learning context.
    let (context, created) = contexts::upsert_learning_context(
        conn,
        &course_key,
        &outline.title,
        outline.published_at,
        &outline.published_version,
    )
    .await
    .map_err(OutlineError::from_storage)?;
    if created {
        info!(course_key = %course_key, "created learning context");
    } else {
        info!(course_key = %course_key, "found learning context, updating");
    }
    let context_id = context.id;

    // 2. The join table is rebuilt from scratch; clearing it first frees
    //    sections and sequences for deletion.
    let placements_deleted = section_sequences::delete_for_context(conn, context_id)
        .await
        .map_err(OutlineError::from_storage)?;

    // 3. Sections.
    for (position, section) in outline.sections.iter().enumerate() {
        sections::upsert_section(
            conn,
            context_id,
            SectionFields {
                usage_key: section.usage_key.as_str(),
                title: &section.title,
                ordering: ordering(position)?,
                hide_from_toc: outline.is_hidden_from_toc(&section.usage_key),
                visible_to_staff_only: outline.is_visible_to_staff_only(&section.usage_key),
            },
        )
        .await
        .map_err(OutlineError::from_storage)?;
    }
    let section_keys: Vec<String> = outline
        .sections
        .iter()
        .map(|s| s.usage_key.to_string())
        .collect();
    let sections_deleted = sections::delete_sections_except(conn, context_id, &section_keys)
        .await
        .map_err(OutlineError::from_storage)?;

    // 4. Sequences, including ones no section lists.
    for sequence in outline.sequences.values() {
        sequences::upsert_sequence(conn, context_id, sequence.usage_key.as_str(), &sequence.title)
            .await
            .map_err(OutlineError::from_storage)?;
    }
    let sequence_keys: Vec<String> = outline.sequences.keys().map(|k| k.to_string()).collect();
    let sequences_deleted = sequences::delete_sequences_except(conn, context_id, &sequence_keys)
        .await
        .map_err(OutlineError::from_storage)?;

    // 5. Placements, positioned within their own section.
    let section_ids: HashMap<String, i64> = sections::list_sections(conn, context_id)
        .await
        .map_err(OutlineError::from_storage)?
        .into_iter()
        .map(|row| (row.usage_key, row.id))
        .collect();
    let sequence_ids: HashMap<String, i64> = sequences::list_sequences(conn, context_id)
        .await
        .map_err(OutlineError::from_storage)?
        .into_iter()
        .map(|row| (row.usage_key, row.id))
        .collect();

    let mut placements_written = 0;
    for section in &outline.sections {
        let section_id = lookup(&section_ids, section.usage_key.as_str(), "section")?;
        for (position, sequence) in section.sequences.iter().enumerate() {
            let sequence_id = lookup(&sequence_ids, sequence.usage_key.as_str(), "sequence")?;
            section_sequences::insert_section_sequence(
                conn,
                context_id,
                PlacementFields {
                    section_id,
                    sequence_id,
                    ordering: ordering(position)?,
                    hide_from_toc: outline.is_hidden_from_toc(&sequence.usage_key),
                    visible_to_staff_only: outline.is_visible_to_staff_only(&sequence.usage_key),
                },
            )
            .await
            .map_err(OutlineError::from_storage)?;
            placements_written += 1;
        }
    }

    debug!(
        placements_deleted,
        sections_deleted, sequences_deleted, placements_written, "projection rows rewritten"
    );

    Ok(ReconcileSummary {
        learning_context_id: context_id,
        created,
        sections_written: outline.sections.len(),
        sections_deleted,
        sequences_written: outline.sequences.len(),
        sequences_deleted,
        placements_written,
    })
}

fn ordering(position: usize) -> Result<i32> {
    i32::try_from(position)
        .map_err(|_| OutlineError::ConstraintViolation(format!("position {position} out of range")))
}

fn lookup(ids: &HashMap<String, i64>, usage_key: &str, kind: &str) -> Result<i64> {
    ids.get(usage_key).copied().ok_or_else(|| {
        OutlineError::ConstraintViolation(format!("{kind} {usage_key} was not written"))
    })
}
