//! Reaction to "course published" events: extract, then reconcile.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result as AnyResult};
use async_trait::async_trait;
use tracing::info;

use crate::api::LearningSequences;
use crate::data::CourseOutlineData;
use crate::error::{OutlineError, Result};
use crate::keys::CourseKey;
use crate::reconciler::ReconcileSummary;

/// The authoritative content source, reduced to outline extraction.
#[async_trait]
pub trait OutlineSource: Send + Sync {
    /// Build a complete snapshot of the published course.
    async fn get_outline(&self, course_key: &CourseKey) -> AnyResult<CourseOutlineData>;
}

/// Why a publish event was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    MalformedKey,
    DeprecatedKey,
}

/// What handling a publish event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Replaced(ReconcileSummary),
    Ignored { key: String, reason: IgnoreReason },
}

/// Handle a publish event for `raw_key`.
///
/// Malformed and deprecated keys are ignored rather than reported, since
/// retrying them can never succeed. Extraction runs before the reconciliation
/// transaction opens. Failures are returned to the caller; nothing retries.
pub async fn handle_course_published(
    api: &LearningSequences,
    source: &dyn OutlineSource,
    raw_key: &str,
) -> Result<PublishOutcome> {
    let course_key: CourseKey = match raw_key.parse() {
        Ok(key) => key,
        Err(_) => return Ok(ignored(raw_key, IgnoreReason::MalformedKey)),
    };
    if course_key.is_deprecated() {
        return Ok(ignored(raw_key, IgnoreReason::DeprecatedKey));
    }

    let outline = source
        .get_outline(&course_key)
        .await
        .map_err(|source| OutlineError::ExternalLoad {
            processor: "outline source".to_owned(),
            source,
        })?;
    if outline.course_key != course_key {
        return Err(OutlineError::ConstraintViolation(format!(
            "outline source returned {} for {}",
            outline.course_key, course_key
        )));
    }

    let summary = api.replace_course_outline(&outline).await?;
    Ok(PublishOutcome::Replaced(summary))
}

fn ignored(raw_key: &str, reason: IgnoreReason) -> PublishOutcome {
    info!(key = raw_key, ?reason, "ignoring publish event");
    PublishOutcome::Ignored {
        key: raw_key.to_owned(),
        reason,
    }
}

/// An [`OutlineSource`] reading JSON snapshots from a directory, one file per
/// course.
#[derive(Debug, Clone)]
pub struct DirectoryOutlineSource {
    dir: PathBuf,
}

impl DirectoryOutlineSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `course-v1:edX+DemoX+2020` is read from `course-v1_edX+DemoX+2020.json`.
    pub fn path_for(&self, course_key: &CourseKey) -> PathBuf {
        self.dir
            .join(format!("{}.json", course_key.to_string().replace(':', "_")))
    }
}

#[async_trait]
impl OutlineSource for DirectoryOutlineSource {
    async fn get_outline(&self, course_key: &CourseKey) -> AnyResult<CourseOutlineData> {
        let path = self.path_for(course_key);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("failed to read outline snapshot {}", path.display()))?;
        let outline = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse outline snapshot {}", path.display()))?;
        Ok(outline)
    }
}
