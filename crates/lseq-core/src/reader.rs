//! Outline reader: rebuilds a [`CourseOutlineData`] snapshot from the
//! projection tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use sqlx::{PgConnection, PgPool};
use tracing::debug;

use lseq_db::queries::{contexts, section_sequences, sections};

use crate::data::{
    CourseItemVisibilityData, CourseOutlineData, CourseSectionData, LearningSequenceData,
};
use crate::error::{OutlineError, Result};
use crate::keys::{CourseKey, UsageKey};

/// Reject deprecated-format keys before touching storage.
pub(crate) fn ensure_supported(course_key: &CourseKey) -> Result<()> {
    if course_key.is_deprecated() {
        return Err(OutlineError::UnsupportedKey(course_key.clone()));
    }
    Ok(())
}

/// Load the stored outline for `course_key`.
///
/// The three reads run in one repeatable-read, read-only transaction, so a
/// reconciliation committing meanwhile is seen either entirely or not at
/// all.
pub async fn get_course_outline(pool: &PgPool, course_key: &CourseKey) -> Result<CourseOutlineData> {
    ensure_supported(course_key)?;

    let mut tx = pool
        .begin()
        .await
        .map_err(OutlineError::sqlx("failed to begin read transaction"))?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await
        .map_err(OutlineError::sqlx("failed to set read isolation"))?;

    let outline = read_outline(&mut tx, course_key).await?;

    tx.commit()
        .await
        .map_err(OutlineError::sqlx("failed to finish read transaction"))?;
    Ok(outline)
}

async fn read_outline(conn: &mut PgConnection, course_key: &CourseKey) -> Result<CourseOutlineData> {
    let context = contexts::get_learning_context(conn, &course_key.to_string())
        .await
        .map_err(OutlineError::from_storage)?
        .ok_or_else(|| OutlineError::NotFound(course_key.clone()))?;

    let section_rows = sections::list_sections(conn, context.id)
        .await
        .map_err(OutlineError::from_storage)?;
    let entries = section_sequences::list_entries(conn, context.id)
        .await
        .map_err(OutlineError::from_storage)?;

    // Grouped by section id so sections without sequences still show up.
    let mut sequences_by_section: HashMap<i64, Vec<LearningSequenceData>> = HashMap::new();
    let mut sequences = BTreeMap::new();
    let mut hide_from_toc = BTreeSet::new();
    let mut visible_to_staff_only = BTreeSet::new();

    for entry in entries {
        let sequence = LearningSequenceData::new(stored_key(&entry.sequence_usage_key)?, entry.sequence_title);
        if entry.hide_from_toc {
            hide_from_toc.insert(sequence.usage_key.clone());
        }
        if entry.visible_to_staff_only {
            visible_to_staff_only.insert(sequence.usage_key.clone());
        }
        sequences.insert(sequence.usage_key.clone(), sequence.clone());
        sequences_by_section
            .entry(entry.section_id)
            .or_default()
            .push(sequence);
    }

    let mut sections_data = Vec::with_capacity(section_rows.len());
    for row in section_rows {
        let usage_key = stored_key(&row.usage_key)?;
        if row.hide_from_toc {
            hide_from_toc.insert(usage_key.clone());
        }
        if row.visible_to_staff_only {
            visible_to_staff_only.insert(usage_key.clone());
        }
        sections_data.push(CourseSectionData {
            usage_key,
            title: row.title,
            sequences: sequences_by_section.remove(&row.id).unwrap_or_default(),
        });
    }

    debug!(
        course_key = %course_key,
        sections = sections_data.len(),
        sequences = sequences.len(),
        "course outline loaded"
    );

    Ok(CourseOutlineData {
        course_key: course_key.clone(),
        title: context.title,
        published_at: context.published_at,
        published_version: context.published_version,
        sections: sections_data,
        sequences,
        visibility: CourseItemVisibilityData {
            hide_from_toc,
            visible_to_staff_only,
        },
    })
}

fn stored_key(text: &str) -> Result<UsageKey> {
    text.parse().map_err(|e| {
        OutlineError::Storage(anyhow::Error::new(e).context("stored usage key is malformed"))
    })
}
