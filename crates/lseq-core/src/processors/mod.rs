//! Overlay processors: per-user data computed over a read snapshot.
//!
//! ```text
//! LearningSequences
//!     |
//!     v
//! ProcessorRegistry --instantiate()--> ProcessorPipeline (fresh per request)
//!                                           |
//!                                           |  load(course_key, user)   once per processor, in order
//!                                           |  hide_set(outline)        union over processors
//!                                           |  data_to_add(outline)     merged, last processor wins
//!                                           v
//!                                   UserCourseOutlineData
//! ```

pub mod pipeline;
pub mod registry;
pub mod schedule;
pub mod trait_def;

pub use pipeline::{ProcessorPipeline, merge_overlay};
pub use registry::{ProcessorFactory, ProcessorRegistry};
pub use schedule::{CourseDates, DateEntry, DateSource, InMemoryDateSource, ScheduleOutlineProcessor};
pub use trait_def::OutlineProcessor;
