//! End-to-end board flow over a replayed feed file and a file-backed stand
//! store: fetch, correlate, render, edit stands, replay history.
mod common;

use std::sync::Arc;

use apronview::correlation::MovementMode;
use apronview::dashboard::{Dashboard, DashboardOptions};
use apronview::editor::StandEdit;
use apronview::feed::{DataSource, FileDataSource};
use apronview::geometry::GeoPoint;
use apronview::stands::{JsonFileStore, StandRecord, StandStore};
use apronview::viewport::MercatorViewport;
use chrono::{TimeZone, Utc};

async fn open_board(store_path: &std::path::Path, history_max: usize) -> Dashboard {
    let store = StandStore::open(Arc::new(JsonFileStore::new(store_path))).await;
    let viewport = MercatorViewport::new(GeoPoint::new(-34.8210, -58.5360), 16.0, 1280.0, 800.0);
    Dashboard::new(
        store,
        Box::new(viewport),
        DashboardOptions {
            history_max,
            ..Default::default()
        },
    )
}

#[tokio::test]
async fn test_replayed_feed_lands_on_stands() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = common::write_file(dir.path(), "stands.json", common::STANDS_JSON);
    let feed_path = common::write_file(dir.path(), "feed.json", common::FEED_JSON);

    let mut board = open_board(&store_path, 60).await;
    assert_eq!(board.stands().len(), 3);

    let payload = FileDataSource::new(&feed_path).fetch().await.unwrap();
    board.ingest(payload, Utc::now());

    let movements = board.movements();
    assert_eq!(movements.len(), 2);

    // natural stand order: 2 before 10
    assert_eq!(movements[0].registration, "LV-BBB");
    assert_eq!(movements[0].stand, "2");
    assert_eq!(movements[0].mode, MovementMode::Arrival);
    assert_eq!(movements[0].transition.as_ref().unwrap().to, "9");

    assert_eq!(movements[1].registration, "LV-AAA");
    assert_eq!(movements[1].stand, "10");
    assert_eq!(movements[1].mode, MovementMode::Turnaround);

    let frame = board.frame();
    assert_eq!(frame.hud_counts, "3 stands • 2 flights");
    assert_eq!(frame.arrows.len(), 1);
    assert_eq!(
        frame.header.clock,
        Some(Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap())
    );
    // cards never leave the viewport after layout
    for card in &frame.cards {
        assert!(card.rect.left() >= 0.0 && card.rect.right() <= 1280.0);
        assert!(card.rect.top() >= 0.0 && card.rect.bottom() <= 800.0);
    }
}

#[tokio::test]
async fn test_stand_edits_persist_and_recorrelate() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = common::write_file(dir.path(), "stands.json", common::STANDS_JSON);
    let feed_path = common::write_file(dir.path(), "feed.json", common::FEED_JSON);

    let mut board = open_board(&store_path, 60).await;
    let payload = FileDataSource::new(&feed_path).fetch().await.unwrap();
    board.ingest(payload, Utc::now());
    assert_eq!(board.movements().len(), 2);

    // LV-CCC departs from 77, which becomes known
    board
        .apply_edit(StandEdit::Upsert(StandRecord::new("77", -34.823, -58.538, 45)))
        .await
        .unwrap();
    assert_eq!(board.movements().len(), 3);
    assert_eq!(board.movements()[2].registration, "LV-CCC");

    // rename 10 -> 10A: the turnaround on 10 disappears
    board
        .apply_edit(StandEdit::Replace {
            old_name: "10".into(),
            record: StandRecord::new("10A", -34.8220, -58.5370, 180),
        })
        .await
        .unwrap();
    assert!(board.movements().iter().all(|m| m.registration != "LV-AAA"));

    // a fresh board over the same file sees the edits
    let reopened = open_board(&store_path, 60).await;
    let names: Vec<&str> = reopened.stands().keys().map(String::as_str).collect();
    assert_eq!(names, vec!["10A", "2", "77", "9"]);
    assert_eq!(reopened.stands()["77"].heading_deg, 45);
}

#[tokio::test]
async fn test_corrupt_store_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = common::write_file(
        dir.path(),
        "stands.json",
        r#"{"apronview.stands.v1": "not json"}"#,
    );
    let feed_path = common::write_file(dir.path(), "feed.json", common::FEED_JSON);

    let mut board = open_board(&store_path, 60).await;
    assert!(board.stands().is_empty());

    let payload = FileDataSource::new(&feed_path).fetch().await.unwrap();
    board.ingest(payload, Utc::now());
    assert!(board.movements().is_empty());
    assert_eq!(board.buffer().len(), 1);
}

#[tokio::test]
async fn test_history_eviction_and_replay() {
    let dir = tempfile::tempdir().unwrap();
    let store_path = common::write_file(dir.path(), "stands.json", common::STANDS_JSON);
    let feed_path = common::write_file(dir.path(), "feed.json", common::FEED_JSON);
    let source = FileDataSource::new(&feed_path);

    let mut board = open_board(&store_path, 4).await;
    let start = Utc.with_ymd_and_hms(2026, 2, 6, 12, 0, 0).unwrap();
    for i in 0..9 {
        let payload = source.fetch().await.unwrap();
        board.ingest(payload, start + chrono::Duration::seconds(15 * i));
    }

    assert_eq!(board.buffer().len(), 4);
    assert_eq!(
        board.buffer().get(0).unwrap().captured_at,
        start + chrono::Duration::seconds(15 * 5)
    );

    board.set_timelapse(true);
    assert_eq!(board.seek(100), Some(3));
    assert_eq!(board.seek(1), Some(1));
    let stored = board.buffer().get(1).unwrap();
    assert_eq!(board.movements(), stored.movements.as_slice());
}

#[tokio::test]
async fn test_missing_feed_file_is_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = FileDataSource::new(dir.path().join("missing.json"));
    let err = source.fetch().await.unwrap_err();
    assert!(err.to_string().starts_with("Feed transport error"));
}
