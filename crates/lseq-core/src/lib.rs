//! Course outline projection: reconciliation, reading, and per-user overlays.
//!
//! ```text
//! publish event --> OutlineSource --> CourseOutlineData --> reconciler --> projection tables
//!                                                                              |
//!                                        UserCourseOutlineData <-- processors <-- reader
//! ```
//!
//! [`LearningSequences`] is the entry point: it owns the pool and the ordered
//! list of overlay processors.

pub mod api;
pub mod data;
pub mod error;
pub mod keys;
pub mod processors;
pub mod publish;
pub mod reader;
pub mod reconciler;

pub use api::{LearningSequences, filter_outline};
pub use data::{
    CourseItemVisibilityData, CourseOutlineBuilder, CourseOutlineData, CourseSectionData,
    DateField, LearningSequenceData, OverlayData, OverlayFields, OverlayValue, ScheduleData,
    ScheduleItemData, User, UserCourseOutlineData,
};
pub use error::OutlineError;
pub use keys::{CourseKey, KeyParseError, UsageKey};
pub use publish::{
    DirectoryOutlineSource, IgnoreReason, OutlineSource, PublishOutcome, handle_course_published,
};
pub use reconciler::ReconcileSummary;
