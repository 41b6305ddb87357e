//! Integration tests for per-user outlines and publish handling.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use lseq_core::processors::{
    DateEntry, InMemoryDateSource, OutlineProcessor, ProcessorRegistry, ScheduleOutlineProcessor,
};
use lseq_core::{
    CourseKey, CourseOutlineData, CourseSectionData, DateField, IgnoreReason, LearningSequenceData,
    LearningSequences, OutlineError, OutlineSource, OverlayData, PublishOutcome, UsageKey, User,
    handle_course_published,
};
use lseq_test_utils::TestDb;

fn key(s: &str) -> UsageKey {
    s.parse().unwrap()
}

fn course_key() -> CourseKey {
    "course-v1:edX+DemoX+2020".parse().unwrap()
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 10, 0, 0, 0).unwrap()
}

fn stored_outline() -> CourseOutlineData {
    let seq = |k: &str| LearningSequenceData::new(key(k), format!("Sequence {k}"));
    CourseOutlineData::builder(course_key(), "Demo Course", now() - Duration::days(30), "v1")
        .section(CourseSectionData::new(key("week1"), "Week 1", vec![seq("intro"), seq("quiz")]))
        .section(CourseSectionData::new(key("week2"), "Week 2", vec![seq("lab")]))
        .build()
        .unwrap()
}

fn date_source() -> Arc<InMemoryDateSource> {
    let entry = |k: &str, field, date| DateEntry {
        usage_key: key(k),
        field,
        date,
        user_id: None,
    };
    Arc::new(InMemoryDateSource::from_entries(
        &course_key(),
        [
            entry("intro", DateField::Start, now() - Duration::days(7)),
            entry("quiz", DateField::Due, now() + Duration::days(3)),
            entry("week2", DateField::Start, now() + Duration::days(7)),
            entry("deleted-seq", DateField::Start, now() - Duration::days(1)),
        ],
    ))
}

async fn seeded(registry: ProcessorRegistry) -> (TestDb, LearningSequences) {
    let db = TestDb::create().await;
    let api = LearningSequences::new(db.pool.clone(), registry);
    api.replace_course_outline(&stored_outline()).await.unwrap();
    (db, api)
}

fn schedule_registry() -> ProcessorRegistry {
    let source = date_source();
    ProcessorRegistry::new().with("schedule", move || {
        Box::new(ScheduleOutlineProcessor::at(source.clone(), now())) as Box<dyn OutlineProcessor>
    })
}

struct FailingProcessor;

#[async_trait]
impl OutlineProcessor for FailingProcessor {
    async fn load(&mut self, _course_key: &CourseKey, _user: &User) -> AnyResult<()> {
        anyhow::bail!("date service unavailable")
    }

    fn data_to_add(&self, _outline: &CourseOutlineData) -> OverlayData {
        OverlayData::new()
    }
}

#[tokio::test]
async fn schedule_overlay_covers_only_current_sequences() {
    let (db, api) = seeded(schedule_registry()).await;

    let learner = User::new(7, "learner");
    let user_outline = api
        .get_course_outline_for_user(&course_key(), &learner)
        .await
        .unwrap();

    assert_eq!(user_outline.outline, stored_outline());
    assert_eq!(user_outline.hidden, BTreeSet::from([key("week2")]));

    let schedule = user_outline.schedule();
    let keys: Vec<&str> = schedule.sequences.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["intro", "quiz"]);
    assert_eq!(schedule.sequences[&key("intro")].start, Some(now() - Duration::days(7)));
    assert_eq!(schedule.sequences[&key("quiz")].due, Some(now() + Duration::days(3)));

    let visible = user_outline.visible_outline();
    assert_eq!(visible.sections.len(), 1);
    assert!(!visible.sequences.contains_key(&key("lab")));

    db.teardown().await;
}

#[tokio::test]
async fn staff_overlay_hides_nothing() {
    let (db, api) = seeded(schedule_registry()).await;

    let staff = User::new(1, "staff").staff();
    let user_outline = api
        .get_course_outline_for_user(&course_key(), &staff)
        .await
        .unwrap();

    assert!(user_outline.hidden.is_empty());
    assert_eq!(user_outline.visible_outline(), stored_outline());

    db.teardown().await;
}

#[tokio::test]
async fn processor_load_failure_is_reported() {
    let registry = schedule_registry().with("flaky", || {
        Box::new(FailingProcessor) as Box<dyn OutlineProcessor>
    });
    let (db, api) = seeded(registry).await;

    let err = api
        .get_course_outline_for_user(&course_key(), &User::new(7, "learner"))
        .await
        .unwrap_err();
    match err {
        OutlineError::ExternalLoad { processor, source } => {
            assert_eq!(processor, "flaky");
            assert!(source.to_string().contains("date service unavailable"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    db.teardown().await;
}

#[tokio::test]
async fn user_outline_of_unknown_course_is_not_found() {
    let db = TestDb::create().await;
    let api = LearningSequences::new(db.pool.clone(), schedule_registry());

    let err = api
        .get_course_outline_for_user(&course_key(), &User::new(7, "learner"))
        .await
        .unwrap_err();
    assert!(matches!(err, OutlineError::NotFound(_)));

    db.teardown().await;
}

/// Hands out a fixed outline, whatever key it is asked for.
struct FixedSource(CourseOutlineData);

#[async_trait]
impl OutlineSource for FixedSource {
    async fn get_outline(&self, _course_key: &CourseKey) -> AnyResult<CourseOutlineData> {
        Ok(self.0.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl OutlineSource for BrokenSource {
    async fn get_outline(&self, _course_key: &CourseKey) -> AnyResult<CourseOutlineData> {
        anyhow::bail!("content store offline")
    }
}

#[tokio::test]
async fn publish_event_replaces_outline() {
    let db = TestDb::create().await;
    let api = LearningSequences::new(db.pool.clone(), ProcessorRegistry::new());

    let source = FixedSource(stored_outline());
    let outcome = handle_course_published(&api, &source, "course-v1:edX+DemoX+2020")
        .await
        .unwrap();
    assert!(matches!(outcome, PublishOutcome::Replaced(ref s) if s.created));
    assert_eq!(api.get_course_outline(&course_key()).await.unwrap(), stored_outline());

    db.teardown().await;
}

#[tokio::test]
async fn publish_event_ignores_unusable_keys() {
    let db = TestDb::create().await;
    let api = LearningSequences::new(db.pool.clone(), ProcessorRegistry::new());

    let outcome = handle_course_published(&api, &BrokenSource, "edX/DemoX/2014")
        .await
        .unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::Ignored {
            key: "edX/DemoX/2014".to_owned(),
            reason: IgnoreReason::DeprecatedKey,
        }
    );

    let outcome = handle_course_published(&api, &BrokenSource, "not a key")
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        PublishOutcome::Ignored { reason: IgnoreReason::MalformedKey, .. }
    ));

    db.teardown().await;
}

#[tokio::test]
async fn publish_event_surfaces_extraction_failure() {
    let db = TestDb::create().await;
    let api = LearningSequences::new(db.pool.clone(), ProcessorRegistry::new());
    api.replace_course_outline(&stored_outline()).await.unwrap();

    let err = handle_course_published(&api, &BrokenSource, "course-v1:edX+DemoX+2020")
        .await
        .unwrap_err();
    assert!(matches!(err, OutlineError::ExternalLoad { .. }));
    assert_eq!(api.get_course_outline(&course_key()).await.unwrap(), stored_outline());

    let mismatched = FixedSource(stored_outline());
    let err = handle_course_published(&api, &mismatched, "course-v1:edX+DemoX+2021")
        .await
        .unwrap_err();
    assert!(matches!(err, OutlineError::ConstraintViolation(_)));

    db.teardown().await;
}
