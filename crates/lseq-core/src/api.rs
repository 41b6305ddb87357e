//! Public entry points: read an outline, read it for a user, replace it.

use std::collections::BTreeSet;

use sqlx::PgPool;
use tracing::debug;

use crate::data::{CourseOutlineData, CourseSectionData, User, UserCourseOutlineData};
use crate::error::Result;
use crate::keys::{CourseKey, UsageKey};
use crate::processors::ProcessorRegistry;
use crate::reconciler::{self, ReconcileSummary};
use crate::reader;

/// The outline API over one database and one ordered set of processors.
#[derive(Debug, Clone)]
pub struct LearningSequences {
    pool: PgPool,
    processors: ProcessorRegistry,
}

impl LearningSequences {
    pub fn new(pool: PgPool, processors: ProcessorRegistry) -> Self {
        Self { pool, processors }
    }

    /// The stored outline, unmodified.
    pub async fn get_course_outline(&self, course_key: &CourseKey) -> Result<CourseOutlineData> {
        reader::get_course_outline(&self.pool, course_key).await
    }

    /// The stored outline plus this user's overlay and hide set.
    ///
    /// The returned `outline` is not filtered; call
    /// [`UserCourseOutlineData::visible_outline`] (or [`filter_outline`]) to
    /// apply the hide set.
    pub async fn get_course_outline_for_user(
        &self,
        course_key: &CourseKey,
        user: &User,
    ) -> Result<UserCourseOutlineData> {
        let outline = self.get_course_outline(course_key).await?;

        let mut pipeline = self.processors.instantiate();
        pipeline.load(course_key, user).await?;
        let hidden = pipeline.hide_set(&outline);
        let overlay = pipeline.data_to_add(&outline);

        debug!(
            course_key = %course_key,
            user = user.id,
            hidden = hidden.len(),
            annotated = overlay.len(),
            "user outline assembled"
        );

        Ok(UserCourseOutlineData {
            outline,
            user: user.clone(),
            overlay,
            hidden,
        })
    }

    /// Replace the stored outline of `outline.course_key`.
    pub async fn replace_course_outline(
        &self,
        outline: &CourseOutlineData,
    ) -> Result<ReconcileSummary> {
        reconciler::replace_course_outline(&self.pool, outline).await
    }
}

/// Remove `hidden` content from an outline.
///
/// Hidden sections go with their sequence lists; hidden sequences leave every
/// section and the full mapping. A sequence that was only reachable through a
/// hidden section leaves the mapping too. Sequences no section ever listed
/// stay. Sections left empty by filtering are kept.
pub fn filter_outline(outline: &CourseOutlineData, hidden: &BTreeSet<UsageKey>) -> CourseOutlineData {
    if hidden.is_empty() {
        return outline.clone();
    }

    let sections: Vec<CourseSectionData> = outline
        .sections
        .iter()
        .filter(|section| !hidden.contains(&section.usage_key))
        .map(|section| CourseSectionData {
            usage_key: section.usage_key.clone(),
            title: section.title.clone(),
            sequences: section
                .sequences
                .iter()
                .filter(|seq| !hidden.contains(&seq.usage_key))
                .cloned()
                .collect(),
        })
        .collect();

    let originally_reachable = outline.reachable_sequence_keys();
    let still_reachable: BTreeSet<&UsageKey> = sections
        .iter()
        .flat_map(|section| section.sequences.iter().map(|seq| &seq.usage_key))
        .collect();

    let sequences = outline
        .sequences
        .iter()
        .filter(|(key, _)| {
            !hidden.contains(*key)
                && (still_reachable.contains(key) || !originally_reachable.contains(key))
        })
        .map(|(key, seq)| (key.clone(), seq.clone()))
        .collect::<std::collections::BTreeMap<_, _>>();

    let remains = |key: &UsageKey| {
        sequences.contains_key(key) || sections.iter().any(|s| s.usage_key == *key)
    };
    let mut visibility = outline.visibility.clone();
    visibility.hide_from_toc.retain(|key| remains(key));
    visibility.visible_to_staff_only.retain(|key| remains(key));

    CourseOutlineData {
        course_key: outline.course_key.clone(),
        title: outline.title.clone(),
        published_at: outline.published_at,
        published_version: outline.published_version.clone(),
        sections,
        sequences,
        visibility,
    }
}
