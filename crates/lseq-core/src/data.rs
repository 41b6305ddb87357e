//! Outline snapshot and overlay value types.
//!
//! These types only validate what they can check on their own: no database
//! access, no calls into other subsystems.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{OutlineError, Result};
use crate::keys::{CourseKey, UsageKey};

/// Fractional-second digits a stored timestamp keeps (microseconds).
const TIMESTAMP_SUBSEC_DIGITS: u16 = 6;

/// Drop precision the projection store cannot hold.
fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(TIMESTAMP_SUBSEC_DIGITS)
}

fn deserialize_stored_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    DateTime::<Utc>::deserialize(deserializer).map(stored_precision)
}

/// A sequence: the unit of navigable content inside a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearningSequenceData {
    pub usage_key: UsageKey,
    pub title: String,
}

impl LearningSequenceData {
    pub fn new(usage_key: UsageKey, title: impl Into<String>) -> Self {
        Self {
            usage_key,
            title: title.into(),
        }
    }
}

/// A section and its sequences, in presentation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSectionData {
    pub usage_key: UsageKey,
    pub title: String,
    pub sequences: Vec<LearningSequenceData>,
}

impl CourseSectionData {
    pub fn new(
        usage_key: UsageKey,
        title: impl Into<String>,
        sequences: Vec<LearningSequenceData>,
    ) -> Self {
        Self {
            usage_key,
            title: title.into(),
            sequences,
        }
    }
}

/// Visibility flags aggregated over sections and sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseItemVisibilityData {
    /// Reachable, but not listed in navigation.
    pub hide_from_toc: BTreeSet<UsageKey>,
    pub visible_to_staff_only: BTreeSet<UsageKey>,
}

/// A complete snapshot of a course outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseOutlineData {
    pub course_key: CourseKey,
    pub title: String,
    /// When the course was last published. Outline generation is asynchronous,
    /// so this can be well before the snapshot was built. Held at
    /// microsecond precision.
    #[serde(deserialize_with = "deserialize_stored_timestamp")]
    pub published_at: DateTime<Utc>,
    /// Changes whenever the published content changes; no other meaning.
    pub published_version: String,
    pub sections: Vec<CourseSectionData>,
    /// Every sequence of the course, including ones no section lists.
    pub sequences: BTreeMap<UsageKey, LearningSequenceData>,
    pub visibility: CourseItemVisibilityData,
}

impl CourseOutlineData {
    /// Start building a snapshot. The full sequence mapping is derived from
    /// the sections added to the builder.
    pub fn builder(
        course_key: CourseKey,
        title: impl Into<String>,
        published_at: DateTime<Utc>,
        published_version: impl Into<String>,
    ) -> CourseOutlineBuilder {
        CourseOutlineBuilder {
            outline: Self {
                course_key,
                title: title.into(),
                published_at: stored_precision(published_at),
                published_version: published_version.into(),
                sections: Vec::new(),
                sequences: BTreeMap::new(),
                visibility: CourseItemVisibilityData::default(),
            },
        }
    }

    /// Check the structural invariants of the snapshot.
    pub fn validate(&self) -> Result<()> {
        if self.course_key.is_deprecated() {
            return Err(OutlineError::UnsupportedKey(self.course_key.clone()));
        }
        if stored_precision(self.published_at) != self.published_at {
            return Err(violation(format_args!(
                "published_at {} is finer than microseconds",
                self.published_at
            )));
        }

        for (key, sequence) in &self.sequences {
            if *key != sequence.usage_key {
                return Err(violation(format_args!(
                    "sequence mapping key {key} holds sequence {}",
                    sequence.usage_key
                )));
            }
        }

        let mut section_keys = HashSet::new();
        for section in &self.sections {
            if !section_keys.insert(&section.usage_key) {
                return Err(violation(format_args!(
                    "duplicate section {}",
                    section.usage_key
                )));
            }

            let mut placed = HashSet::new();
            for sequence in &section.sequences {
                if !placed.insert(&sequence.usage_key) {
                    return Err(violation(format_args!(
                        "sequence {} appears twice in section {}",
                        sequence.usage_key, section.usage_key
                    )));
                }
                match self.sequences.get(&sequence.usage_key) {
                    Some(known) if known == sequence => {}
                    Some(known) => {
                        return Err(violation(format_args!(
                            "sequence {} is titled {:?} in section {} but {:?} in the sequence mapping",
                            sequence.usage_key, sequence.title, section.usage_key, known.title
                        )));
                    }
                    None => {
                        return Err(violation(format_args!(
                            "sequence {} in section {} is missing from the sequence mapping",
                            sequence.usage_key, section.usage_key
                        )));
                    }
                }
            }
        }

        let flagged = self
            .visibility
            .hide_from_toc
            .iter()
            .chain(&self.visibility.visible_to_staff_only);
        for key in flagged {
            if !section_keys.contains(key) && !self.sequences.contains_key(key) {
                return Err(violation(format_args!(
                    "visibility flag names {key}, which is neither a section nor a sequence"
                )));
            }
        }

        Ok(())
    }

    /// Keys of every sequence listed by at least one section.
    pub fn reachable_sequence_keys(&self) -> BTreeSet<&UsageKey> {
        self.sections
            .iter()
            .flat_map(|section| section.sequences.iter().map(|seq| &seq.usage_key))
            .collect()
    }

    pub fn is_hidden_from_toc(&self, key: &UsageKey) -> bool {
        self.visibility.hide_from_toc.contains(key)
    }

    pub fn is_visible_to_staff_only(&self, key: &UsageKey) -> bool {
        self.visibility.visible_to_staff_only.contains(key)
    }
}

fn violation(message: fmt::Arguments<'_>) -> OutlineError {
    OutlineError::ConstraintViolation(message.to_string())
}

/// Builder for [`CourseOutlineData`].
#[derive(Debug, Clone)]
pub struct CourseOutlineBuilder {
    outline: CourseOutlineData,
}

impl CourseOutlineBuilder {
    /// Append a section; its sequences join the full sequence mapping.
    pub fn section(mut self, section: CourseSectionData) -> Self {
        for sequence in &section.sequences {
            self.outline
                .sequences
                .insert(sequence.usage_key.clone(), sequence.clone());
        }
        self.outline.sections.push(section);
        self
    }

    /// Add a sequence that no section lists but that stays linkable.
    pub fn unreachable_sequence(mut self, sequence: LearningSequenceData) -> Self {
        self.outline
            .sequences
            .insert(sequence.usage_key.clone(), sequence);
        self
    }

    pub fn hide_from_toc(mut self, key: UsageKey) -> Self {
        self.outline.visibility.hide_from_toc.insert(key);
        self
    }

    pub fn visible_to_staff_only(mut self, key: UsageKey) -> Self {
        self.outline.visibility.visible_to_staff_only.insert(key);
        self
    }

    /// Finish and validate the snapshot.
    pub fn build(self) -> Result<CourseOutlineData> {
        self.outline.validate()?;
        Ok(self.outline)
    }
}

// ---------------------------------------------------------------------------
// Per-user overlay
// ---------------------------------------------------------------------------

/// The user an overlay is computed for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub is_staff: bool,
}

impl User {
    pub fn new(id: i64, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            is_staff: false,
        }
    }

    pub fn staff(mut self) -> Self {
        self.is_staff = true;
        self
    }
}

/// One overlay field value, serialized as `{"type": ..., "value": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum OverlayValue {
    Timestamp(DateTime<Utc>),
    Flag(bool),
    Text(String),
}

impl OverlayValue {
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// Overlay fields for one content key, by field name.
pub type OverlayFields = BTreeMap<String, OverlayValue>;

/// Overlay fields for every annotated content key.
pub type OverlayData = BTreeMap<UsageKey, OverlayFields>;

/// The date fields a schedule can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    Start,
    Due,
}

impl DateField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Due => "due",
        }
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start and due dates of one item for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleItemData {
    pub usage_key: UsageKey,
    pub start: Option<DateTime<Utc>>,
    pub due: Option<DateTime<Utc>>,
}

/// Schedule entries by content key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleData {
    pub sequences: BTreeMap<UsageKey, ScheduleItemData>,
}

impl ScheduleData {
    /// Collect the `start` / `due` timestamp fields out of an overlay.
    /// Keys carrying neither are left out.
    pub fn from_overlay(overlay: &OverlayData) -> Self {
        let sequences = overlay
            .iter()
            .filter_map(|(key, fields)| {
                let field = |f: DateField| fields.get(f.as_str()).and_then(OverlayValue::as_timestamp);
                let item = ScheduleItemData {
                    usage_key: key.clone(),
                    start: field(DateField::Start),
                    due: field(DateField::Due),
                };
                (item.start.is_some() || item.due.is_some()).then(|| (key.clone(), item))
            })
            .collect();
        Self { sequences }
    }

    /// Render the schedule as overlay fields.
    pub fn to_overlay(&self) -> OverlayData {
        self.sequences
            .iter()
            .map(|(key, item)| {
                let mut fields = OverlayFields::new();
                if let Some(start) = item.start {
                    fields.insert(DateField::Start.to_string(), OverlayValue::Timestamp(start));
                }
                if let Some(due) = item.due {
                    fields.insert(DateField::Due.to_string(), OverlayValue::Timestamp(due));
                }
                (key.clone(), fields)
            })
            .collect()
    }
}

/// A base outline combined with one user's overlay.
///
/// `outline` is the unfiltered snapshot; `hidden` is what the configured
/// processors would remove for this user. See
/// [`UserCourseOutlineData::visible_outline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCourseOutlineData {
    pub outline: CourseOutlineData,
    pub user: User,
    pub overlay: OverlayData,
    pub hidden: BTreeSet<UsageKey>,
}

impl UserCourseOutlineData {
    /// The schedule part of the overlay.
    pub fn schedule(&self) -> ScheduleData {
        ScheduleData::from_overlay(&self.overlay)
    }

    /// The outline with the hide set applied.
    pub fn visible_outline(&self) -> CourseOutlineData {
        crate::api::filter_outline(&self.outline, &self.hidden)
    }
}
