//! Row types for the projection tables.
//!
//! These mirror the table layout one-to-one and carry database identifiers;
//! the domain snapshot types live in `lseq-core`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One row of `learning_contexts`: a course-like grouping of content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LearningContext {
    pub id: i64,
    pub context_key: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    /// Opaque token that changes whenever the published content changes.
    pub published_version: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// One row of `learning_sequences`, scoped to its learning context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct LearningSequence {
    pub id: i64,
    pub learning_context_id: i64,
    pub usage_key: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// One row of `course_sections`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CourseSection {
    pub id: i64,
    pub learning_context_id: i64,
    pub usage_key: String,
    pub title: String,
    /// 0-based position among the context's sections.
    pub ordering: i32,
    pub hide_from_toc: bool,
    pub visible_to_staff_only: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// One row of `course_section_sequences`, the section/sequence join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct CourseSectionSequence {
    pub id: i64,
    pub learning_context_id: i64,
    pub section_id: i64,
    pub sequence_id: i64,
    /// 0-based position of the sequence within its section.
    pub ordering: i32,
    pub hide_from_toc: bool,
    pub visible_to_staff_only: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// A join row together with the sequence it points at.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SectionSequenceEntry {
    pub section_id: i64,
    pub ordering: i32,
    pub hide_from_toc: bool,
    pub visible_to_staff_only: bool,
    pub sequence_usage_key: String,
    pub sequence_title: String,
}

/// Values written for a section by an upsert.
#[derive(Debug, Clone, Copy)]
pub struct SectionFields<'a> {
    pub usage_key: &'a str,
    pub title: &'a str,
    pub ordering: i32,
    pub hide_from_toc: bool,
    pub visible_to_staff_only: bool,
}

/// Values written for a join row.
#[derive(Debug, Clone, Copy)]
pub struct PlacementFields {
    pub section_id: i64,
    pub sequence_id: i64,
    pub ordering: i32,
    pub hide_from_toc: bool,
    pub visible_to_staff_only: bool,
}
