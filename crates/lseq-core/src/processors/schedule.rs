//! Schedule overlay: per-user start and due dates.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trait_def::OutlineProcessor;
use crate::data::{CourseOutlineData, DateField, OverlayData, ScheduleData, ScheduleItemData, User};
use crate::keys::{CourseKey, UsageKey};

/// Every date a course defines for a user, keyed by item and field.
pub type CourseDates = HashMap<(UsageKey, DateField), DateTime<Utc>>;

/// The scheduling subsystem, as seen by the schedule processor.
#[async_trait]
pub trait DateSource: Send + Sync {
    /// Bulk-fetch all dates of all items in the course for this user.
    async fn dates_for_course(&self, course_key: &CourseKey, user: &User) -> Result<CourseDates>;
}

/// Adds start/due dates to sequences and hides items that have not started.
pub struct ScheduleOutlineProcessor {
    source: Arc<dyn DateSource>,
    now: DateTime<Utc>,
    dates: CourseDates,
    is_staff: bool,
}

impl ScheduleOutlineProcessor {
    pub fn new(source: Arc<dyn DateSource>) -> Self {
        Self::at(source, Utc::now())
    }

    /// A processor that judges release against `now` instead of the clock.
    pub fn at(source: Arc<dyn DateSource>, now: DateTime<Utc>) -> Self {
        Self {
            source,
            now,
            dates: CourseDates::new(),
            is_staff: false,
        }
    }

    /// The loaded dates of every sequence in the outline's full mapping.
    pub fn schedule(&self, outline: &CourseOutlineData) -> ScheduleData {
        let mut sequences = std::collections::BTreeMap::new();
        for ((usage_key, field), date) in &self.dates {
            if !outline.sequences.contains_key(usage_key) {
                continue;
            }
            let item = sequences
                .entry(usage_key.clone())
                .or_insert_with(|| ScheduleItemData {
                    usage_key: usage_key.clone(),
                    start: None,
                    due: None,
                });
            match field {
                DateField::Start => item.start = Some(*date),
                DateField::Due => item.due = Some(*date),
            }
        }
        ScheduleData { sequences }
    }
}

#[async_trait]
impl OutlineProcessor for ScheduleOutlineProcessor {
    async fn load(&mut self, course_key: &CourseKey, user: &User) -> Result<()> {
        self.dates = self.source.dates_for_course(course_key, user).await?;
        self.is_staff = user.is_staff;
        Ok(())
    }

    /// Sections and sequences whose start date is still ahead. Staff see
    /// unreleased content, so nothing is hidden for them.
    fn hide_set(&self, outline: &CourseOutlineData) -> BTreeSet<UsageKey> {
        if self.is_staff {
            return BTreeSet::new();
        }
        self.dates
            .iter()
            .filter(|((usage_key, field), start)| {
                *field == DateField::Start
                    && **start > self.now
                    && (outline.sequences.contains_key(usage_key)
                        || outline.sections.iter().any(|s| s.usage_key == *usage_key))
            })
            .map(|((usage_key, _), _)| usage_key.clone())
            .collect()
    }

    fn data_to_add(&self, outline: &CourseOutlineData) -> OverlayData {
        self.schedule(outline).to_overlay()
    }
}

// ---------------------------------------------------------------------------
// In-memory date source
// ---------------------------------------------------------------------------

/// One date, optionally personalized to a single user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateEntry {
    pub usage_key: UsageKey,
    pub field: DateField,
    pub date: DateTime<Utc>,
    /// When set, the date overrides the course-wide one for this user only.
    #[serde(default)]
    pub user_id: Option<i64>,
}

/// A [`DateSource`] backed by a table held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDateSource {
    course_wide: HashMap<CourseKey, CourseDates>,
    overrides: HashMap<(CourseKey, i64), CourseDates>,
}

impl InMemoryDateSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(course_key: &CourseKey, entries: impl IntoIterator<Item = DateEntry>) -> Self {
        let mut source = Self::new();
        for entry in entries {
            source.insert(course_key, entry);
        }
        source
    }

    pub fn insert(&mut self, course_key: &CourseKey, entry: DateEntry) {
        let dates = match entry.user_id {
            Some(user_id) => self.overrides.entry((course_key.clone(), user_id)).or_default(),
            None => self.course_wide.entry(course_key.clone()).or_default(),
        };
        dates.insert((entry.usage_key, entry.field), entry.date);
    }
}

#[async_trait]
impl DateSource for InMemoryDateSource {
    async fn dates_for_course(&self, course_key: &CourseKey, user: &User) -> Result<CourseDates> {
        let mut dates = self.course_wide.get(course_key).cloned().unwrap_or_default();
        if let Some(personal) = self.overrides.get(&(course_key.clone(), user.id)) {
            dates.extend(personal.iter().map(|(k, v)| (k.clone(), *v)));
        }
        Ok(dates)
    }
}
