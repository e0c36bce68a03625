//! Batches keep going when single images fail.

use std::fs;
use std::sync::Mutex;

use bbox_editor::io::{self, CancellationToken, IssueKind, StrategyFormat, TaskControl};
use bbox_editor::model::{BoundingBox, BoundingShapeData};

mod common;

use common::{image_name, sample_project};

#[test]
fn voc_save_reports_unwritable_image_and_finishes_batch() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let data = sample_project(10);

    // A non-empty directory where img05.xml should go cannot be replaced.
    let blocked = temp.path().join("img05.xml");
    fs::create_dir_all(&blocked).expect("create blocking dir");
    fs::write(blocked.join("keep.txt"), "x").expect("write blocker content");

    let result = io::save(StrategyFormat::PascalVoc, &data, temp.path(), &TaskControl::none()).expect("save");

    assert_eq!(result.processed_items, 9);
    assert_eq!(result.total_items, 10);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].item, image_name(5));
    assert_eq!(result.errors[0].kind, IssueKind::Io);
    assert!(temp.path().join("img10.xml").is_file());
    assert!(!result.cancelled);
}

#[test]
fn voc_load_skips_corrupt_document() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let data = sample_project(10);
    io::save(StrategyFormat::PascalVoc, &data, temp.path(), &TaskControl::none()).expect("save");
    fs::write(temp.path().join("img05.xml"), "<annotation><filename>").expect("corrupt img05.xml");

    let result = io::load(StrategyFormat::PascalVoc, temp.path(), &TaskControl::none()).expect("load");

    assert_eq!(result.processed_items, 9);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].item.ends_with("img05.xml"));
    assert_eq!(result.errors[0].kind, IssueKind::Format);
    assert_eq!(result.data.len(), 9);
    assert!(result.data.annotation(&image_name(5)).is_none());
    assert!(result.data.annotation(&image_name(10)).is_some());
}

#[test]
fn simple_save_rejects_non_finite_image_only() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("project.json");
    let mut data = sample_project(10);
    let car = data.categories().id_of("car").expect("car registered");
    data.add_shape(
        &image_name(5),
        BoundingShapeData::new_box(car, BoundingBox::from_xyxy(0.0, f64::INFINITY, 1.0, 1.0)),
    )
    .expect("add shape");

    let saved = io::save(StrategyFormat::Simple, &data, &path, &TaskControl::none()).expect("save");
    assert_eq!(saved.processed_items, 9);
    assert_eq!(saved.errors.len(), 1);
    assert_eq!(saved.errors[0].item, image_name(5));

    let loaded = io::load(StrategyFormat::Simple, &path, &TaskControl::none()).expect("load");
    assert!(loaded.is_complete());
    assert_eq!(loaded.data.len(), 9);
    assert!(loaded.data.annotation(&image_name(5)).is_none());
}

#[test]
fn simple_load_skips_malformed_image_entry() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("project.json");
    io::save(StrategyFormat::Simple, &sample_project(10), &path, &TaskControl::none()).expect("save");

    let mut document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read project")).expect("parse project");
    document["images"][4]["shapes"] = serde_json::json!("not a list");
    fs::write(&path, serde_json::to_string(&document).expect("serialize")).expect("write project");

    let loaded = io::load(StrategyFormat::Simple, &path, &TaskControl::none()).expect("load");
    assert_eq!(loaded.processed_items, 9);
    assert_eq!(loaded.errors.len(), 1);
    assert!(loaded.errors[0].item.ends_with("#images[4]"));
    assert!(loaded.data.annotation(&image_name(5)).is_none());
}

#[test]
fn progress_is_monotonic_and_ends_at_one() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let data = sample_project(7);

    for format in StrategyFormat::ALL {
        let seen = Mutex::new(Vec::new());
        let on_progress = |fraction: f64| seen.lock().unwrap().push(fraction);
        let control = TaskControl::none().with_progress(&on_progress);
        let target = temp.path().join(format.tag());

        io::save(format, &data, &target, &control).expect("save");
        io::load(format, &target, &control).expect("load");

        let seen = seen.into_inner().unwrap();
        assert!(seen.iter().all(|p| (0.0..=1.0).contains(p)), "{format}: {seen:?}");
        assert_eq!(seen.last(), Some(&1.0), "{format}");
        // Each batch restarts at 0 and never decreases within itself.
        let batches: Vec<&[f64]> = seen.split_inclusive(|p| *p == 1.0).collect();
        assert!(batches.iter().all(|b| b.windows(2).all(|w| w[0] <= w[1])), "{format}: {seen:?}");
    }
}

#[test]
fn cancelled_voc_save_keeps_only_completed_images() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let data = sample_project(10);
    let token = CancellationToken::new();
    let cancel_after_three = |fraction: f64| {
        if fraction >= 0.3 {
            token.cancel();
        }
    };
    let control = TaskControl::none().with_progress(&cancel_after_three).with_cancel(&token);

    let result = io::save(StrategyFormat::PascalVoc, &data, temp.path(), &control).expect("save");

    assert!(result.cancelled);
    assert_eq!(result.processed_items, 3);
    assert!(result.errors.is_empty());
    assert!(temp.path().join("img03.xml").is_file());
    assert!(!temp.path().join("img04.xml").exists());
}

#[test]
fn cancelled_simple_save_writes_nothing() {
    let temp = tempfile::tempdir().expect("create temp dir");
    let path = temp.path().join("project.json");
    let token = CancellationToken::new();
    token.cancel();

    let result = io::save(
        StrategyFormat::Simple,
        &sample_project(3),
        &path,
        &TaskControl::none().with_cancel(&token),
    )
    .expect("save");

    assert!(result.cancelled);
    assert_eq!(result.processed_items, 0);
    assert!(!path.exists());
}

#[test]
fn cancelled_load_returns_completed_images() {
    let temp = tempfile::tempdir().expect("create temp dir");
    io::save(StrategyFormat::PascalVoc, &sample_project(10), temp.path(), &TaskControl::none()).expect("save");

    let token = CancellationToken::new();
    let cancel_at_half = |fraction: f64| {
        if fraction >= 0.5 {
            token.cancel();
        }
    };
    let control = TaskControl::none().with_progress(&cancel_at_half).with_cancel(&token);
    let result = io::load(StrategyFormat::PascalVoc, temp.path(), &control).expect("load");

    assert!(result.cancelled);
    assert_eq!(result.processed_items, 5);
    assert_eq!(result.data.len(), 5);
}
