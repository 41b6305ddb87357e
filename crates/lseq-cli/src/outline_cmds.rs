//! `lseq replace`, `lseq show`, `lseq list` and `lseq publish`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use sqlx::PgPool;

use lseq_core::processors::{
    DateEntry, InMemoryDateSource, OutlineProcessor, ProcessorRegistry, ScheduleOutlineProcessor,
};
use lseq_core::{
    CourseKey, CourseOutlineData, DirectoryOutlineSource, LearningSequences, PublishOutcome, User,
    handle_course_published,
};
use lseq_db::queries::contexts;

/// Options for `lseq show`.
#[derive(Debug)]
pub struct ShowOptions {
    pub course_key: String,
    pub user: Option<User>,
    pub dates: Option<PathBuf>,
    pub filtered: bool,
}

fn parse_course_key(raw: &str) -> Result<CourseKey> {
    raw.parse()
        .with_context(|| format!("invalid course key: {raw}"))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{out}");
    Ok(())
}

/// Read a snapshot from a JSON file and store it.
pub async fn run_replace(pool: &PgPool, file: &Path) -> Result<()> {
    let contents = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read outline file {}", file.display()))?;
    let outline: CourseOutlineData = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse outline file {}", file.display()))?;

    let api = LearningSequences::new(pool.clone(), ProcessorRegistry::new());
    let summary = api
        .replace_course_outline(&outline)
        .await
        .with_context(|| format!("failed to replace outline of {}", outline.course_key))?;
    print_json(&summary)
}

/// Load per-item dates from a JSON array of [`DateEntry`] values.
async fn load_dates(course_key: &CourseKey, path: &Path) -> Result<InMemoryDateSource> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read dates file {}", path.display()))?;
    let entries: Vec<DateEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse dates file {}", path.display()))?;
    Ok(InMemoryDateSource::from_entries(course_key, entries))
}

/// Print the stored outline, or a user's view of it.
pub async fn run_show(pool: &PgPool, opts: ShowOptions) -> Result<()> {
    let course_key = parse_course_key(&opts.course_key)?;

    let mut registry = ProcessorRegistry::new();
    if let Some(path) = &opts.dates {
        let source = Arc::new(load_dates(&course_key, path).await?);
        registry.register("schedule", move || {
            Box::new(ScheduleOutlineProcessor::new(source.clone())) as Box<dyn OutlineProcessor>
        });
    }
    let api = LearningSequences::new(pool.clone(), registry);

    let Some(user) = opts.user else {
        let outline = api.get_course_outline(&course_key).await?;
        return print_json(&outline);
    };

    let user_outline = api.get_course_outline_for_user(&course_key, &user).await?;
    if opts.filtered {
        print_json(&json!({
            "outline": user_outline.visible_outline(),
            "schedule": user_outline.schedule(),
        }))
    } else {
        print_json(&user_outline)
    }
}

/// List every stored course.
pub async fn run_list(pool: &PgPool) -> Result<()> {
    let mut conn = pool.acquire().await.context("failed to acquire connection")?;
    let rows = contexts::list_learning_contexts(&mut conn).await?;

    if rows.is_empty() {
        eprintln!("No courses stored. Use `lseq replace` or `lseq publish` to add one.");
    }
    let listing: Vec<_> = rows
        .iter()
        .map(|ctx| {
            json!({
                "course_key": ctx.context_key,
                "title": ctx.title,
                "published_at": ctx.published_at,
                "published_version": ctx.published_version,
            })
        })
        .collect();
    print_json(&listing)
}

/// Handle a publish event by reading the course snapshot from `source_dir`.
pub async fn run_publish(pool: &PgPool, raw_key: &str, source_dir: PathBuf) -> Result<()> {
    let api = LearningSequences::new(pool.clone(), ProcessorRegistry::new());
    let source = DirectoryOutlineSource::new(source_dir);

    match handle_course_published(&api, &source, raw_key).await? {
        PublishOutcome::Replaced(summary) => print_json(&summary),
        PublishOutcome::Ignored { key, reason } => {
            print_json(&json!({ "ignored": key, "reason": format!("{reason:?}") }))
        }
    }
}
