//! Integration tests for the projection tables and their constraints.
//!
//! Each test runs against its own temporary database created by
//! `lseq-test-utils`.

use chrono::{TimeZone, Utc};
use sqlx::PgConnection;

use lseq_db::models::{PlacementFields, SectionFields};
use lseq_db::pool;
use lseq_db::queries::{contexts, section_sequences, sections, sequences};
use lseq_test_utils::TestDb;

fn is_db_error(err: &anyhow::Error, pred: impl Fn(&dyn sqlx::error::DatabaseError) -> bool) -> bool {
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => pred(db.as_ref()),
        _ => false,
    })
}

async fn new_context(conn: &mut PgConnection, key: &str) -> i64 {
    let (ctx, _) = contexts::upsert_learning_context(
        conn,
        key,
        "Course",
        Utc.with_ymd_and_hms(2020, 3, 21, 0, 0, 0).unwrap(),
        "v1",
    )
    .await
    .expect("upsert context");
    ctx.id
}

fn section<'a>(usage_key: &'a str, ordering: i32) -> SectionFields<'a> {
    SectionFields {
        usage_key,
        title: "Section",
        ordering,
        hide_from_toc: false,
        visible_to_staff_only: false,
    }
}

#[tokio::test]
async fn migrations_create_projection_tables() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();

    let counts = pool::table_counts(&pool).await.unwrap();
    let names: Vec<&str> = counts.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, pool::PROJECTION_TABLES.to_vec());
    assert!(counts.iter().all(|(_, c)| *c == 0));

    db.teardown().await;
}

#[tokio::test]
async fn upsert_context_reports_creation_then_update() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();
    let mut conn = pool.acquire().await.unwrap();
    let published = Utc.with_ymd_and_hms(2021, 1, 1, 12, 0, 0).unwrap();

    let (first, created) = contexts::upsert_learning_context(
        &mut conn,
        "course-v1:edX+DemoX+2021",
        "Demo",
        published,
        "abc",
    )
    .await
    .unwrap();
    assert!(created);

    let (second, created) = contexts::upsert_learning_context(
        &mut conn,
        "course-v1:edX+DemoX+2021",
        "Demo Renamed",
        published,
        "def",
    )
    .await
    .unwrap();
    assert!(!created);
    assert_eq!(second.id, first.id);
    assert_eq!(second.title, "Demo Renamed");
    assert_eq!(second.published_version, "def");

    let fetched = contexts::get_learning_context(&mut conn, "course-v1:edX+DemoX+2021")
        .await
        .unwrap()
        .expect("context should exist");
    assert_eq!(fetched.published_at, published);

    assert!(
        contexts::get_learning_context(&mut conn, "course-v1:edX+Other+2021")
            .await
            .unwrap()
            .is_none()
    );

    drop(conn);
    db.teardown().await;
}

#[tokio::test]
async fn same_usage_key_in_two_contexts_is_two_rows() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();
    let mut conn = pool.acquire().await.unwrap();

    let a = new_context(&mut conn, "course-v1:o+a+r").await;
    let b = new_context(&mut conn, "course-v1:o+b+r").await;

    let seq_a = sequences::upsert_sequence(&mut conn, a, "seq-1", "In A").await.unwrap();
    let seq_b = sequences::upsert_sequence(&mut conn, b, "seq-1", "In B").await.unwrap();
    assert_ne!(seq_a.id, seq_b.id);

    // Re-upserting updates in place.
    let again = sequences::upsert_sequence(&mut conn, a, "seq-1", "Renamed").await.unwrap();
    assert_eq!(again.id, seq_a.id);
    assert_eq!(sequences::list_sequences(&mut conn, a).await.unwrap().len(), 1);
    assert_eq!(sequences::list_sequences(&mut conn, b).await.unwrap()[0].title, "In B");

    drop(conn);
    db.teardown().await;
}

#[tokio::test]
async fn join_row_cannot_cross_contexts() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();
    let mut conn = pool.acquire().await.unwrap();

    let a = new_context(&mut conn, "course-v1:o+a+r").await;
    let b = new_context(&mut conn, "course-v1:o+b+r").await;
    let sec = sections::upsert_section(&mut conn, a, section("sec", 0)).await.unwrap();
    let seq = sequences::upsert_sequence(&mut conn, b, "seq", "Elsewhere").await.unwrap();

    let err = section_sequences::insert_section_sequence(
        &mut conn,
        a,
        PlacementFields {
            section_id: sec.id,
            sequence_id: seq.id,
            ordering: 0,
            hide_from_toc: false,
            visible_to_staff_only: false,
        },
    )
    .await
    .expect_err("cross-context placement must be rejected");
    assert!(is_db_error(&err, |db| db.is_foreign_key_violation()), "{err:#}");

    drop(conn);
    db.teardown().await;
}

#[tokio::test]
async fn overlong_title_violates_check() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();
    let mut conn = pool.acquire().await.unwrap();

    let ctx = new_context(&mut conn, "course-v1:o+c+r").await;
    let title = "x".repeat(256);
    let err = sequences::upsert_sequence(&mut conn, ctx, "seq", &title)
        .await
        .expect_err("title longer than 255 characters must be rejected");
    assert!(is_db_error(&err, |db| db.is_check_violation()), "{err:#}");

    drop(conn);
    db.teardown().await;
}

#[tokio::test]
async fn section_order_is_checked_at_commit() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();

    let ctx = {
        let mut conn = pool.acquire().await.unwrap();
        let ctx = new_context(&mut conn, "course-v1:o+c+r").await;
        sections::upsert_section(&mut conn, ctx, section("first", 0)).await.unwrap();
        sections::upsert_section(&mut conn, ctx, section("second", 1)).await.unwrap();
        ctx
    };

    // Swapping positions passes through a duplicate ordering mid-transaction.
    let mut tx = pool.begin().await.unwrap();
    sections::upsert_section(&mut tx, ctx, section("second", 0)).await.unwrap();
    sections::upsert_section(&mut tx, ctx, section("first", 1)).await.unwrap();
    tx.commit().await.expect("swap should commit");

    let mut conn = pool.acquire().await.unwrap();
    let keys: Vec<String> = sections::list_sections(&mut conn, ctx)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.usage_key)
        .collect();
    assert_eq!(keys, vec!["second", "first"]);

    // A duplicate that survives to commit is rejected.
    let mut tx = pool.begin().await.unwrap();
    sections::upsert_section(&mut tx, ctx, section("first", 0)).await.unwrap();
    let err = tx.commit().await.expect_err("duplicate ordering must fail at commit");
    assert!(matches!(err, sqlx::Error::Database(ref db) if db.is_unique_violation()), "{err}");

    drop(conn);
    db.teardown().await;
}

#[tokio::test]
async fn delete_except_keeps_listed_keys() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();
    let mut conn = pool.acquire().await.unwrap();

    let ctx = new_context(&mut conn, "course-v1:o+c+r").await;
    for (i, key) in ["a", "b", "c"].into_iter().enumerate() {
        sections::upsert_section(&mut conn, ctx, section(key, i as i32)).await.unwrap();
        sequences::upsert_sequence(&mut conn, ctx, key, "Seq").await.unwrap();
    }

    let keep = vec!["b".to_owned()];
    assert_eq!(sections::delete_sections_except(&mut conn, ctx, &keep).await.unwrap(), 2);
    assert_eq!(sequences::delete_sequences_except(&mut conn, ctx, &keep).await.unwrap(), 2);

    // An empty keep list clears the context.
    assert_eq!(sequences::delete_sequences_except(&mut conn, ctx, &[]).await.unwrap(), 1);

    let remaining = sections::list_sections(&mut conn, ctx).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].usage_key, "b");

    drop(conn);
    db.teardown().await;
}

#[tokio::test]
async fn entries_come_back_in_section_order() {
    let db = TestDb::create().await;
    let pool = db.pool.clone();
    let mut conn = pool.acquire().await.unwrap();

    let ctx = new_context(&mut conn, "course-v1:o+c+r").await;
    let sec = sections::upsert_section(&mut conn, ctx, section("sec", 0)).await.unwrap();
    let later = sequences::upsert_sequence(&mut conn, ctx, "later", "Later").await.unwrap();
    let earlier = sequences::upsert_sequence(&mut conn, ctx, "earlier", "Earlier").await.unwrap();

    for (ordering, seq_id) in [(1, later.id), (0, earlier.id)] {
        section_sequences::insert_section_sequence(
            &mut conn,
            ctx,
            PlacementFields {
                section_id: sec.id,
                sequence_id: seq_id,
                ordering,
                hide_from_toc: ordering == 1,
                visible_to_staff_only: false,
            },
        )
        .await
        .unwrap();
    }

    let entries = section_sequences::list_entries(&mut conn, ctx).await.unwrap();
    let keys: Vec<&str> = entries.iter().map(|e| e.sequence_usage_key.as_str()).collect();
    assert_eq!(keys, vec!["earlier", "later"]);
    assert!(entries[1].hide_from_toc);

    assert_eq!(section_sequences::delete_for_context(&mut conn, ctx).await.unwrap(), 2);
    assert!(section_sequences::list_section_sequences(&mut conn, ctx).await.unwrap().is_empty());

    drop(conn);
    db.teardown().await;
}
