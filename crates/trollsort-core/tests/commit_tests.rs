use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

use trollsort_core::audit::{AppliedCollision, CollisionCause, ReportRecord};
use trollsort_core::classify::{parse_exif_datetime, ClassifiedItem};
use trollsort_core::commit::MAX_DISAMBIGUATION;
use trollsort_core::{
    build_index, plan_copies, CollisionPolicy, CommitEngine, CopyPlan, PlanKind, SilentReporter,
};

fn item(src: &Path, date: Option<&str>, sidecars: &[&Path]) -> ClassifiedItem {
    ClassifiedItem {
        src: src.to_path_buf(),
        mime_type: Some("image/jpeg".to_string()),
        exif_tag_used: date.map(|_| "DateTimeOriginal"),
        exif_date: date.and_then(parse_exif_datetime),
        sidecars: sidecars.iter().map(|p| p.to_path_buf()).collect(),
    }
}

/// Source and destination roots, both canonical.
fn roots() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let tmp = tempdir().unwrap();
    let src = tmp.path().join("card");
    let dest = tmp.path().join("sorted");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dest).unwrap();
    let src = src.canonicalize().unwrap();
    let dest = dest.canonicalize().unwrap();
    (tmp, src, dest)
}

fn write(path: &Path, content: &str) -> PathBuf {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
    path.to_path_buf()
}

fn run(
    items: &[ClassifiedItem],
    dest: &Path,
    policy: CollisionPolicy,
) -> trollsort_core::AuditLog {
    let (plans, _) = plan_copies(items, dest);
    let mut index = build_index(dest, &SilentReporter).unwrap();
    CommitEngine::new(dest, policy)
        .commit(&plans, &mut index, &SilentReporter)
        .unwrap()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_identical_sources_are_copied_once() {
    let (_tmp, src, dest) = roots();
    let a = write(&src.join("a.jpg"), "same bytes");
    let b = write(&src.join("b.jpg"), "same bytes");

    let log = run(&[item(&a, None, &[]), item(&b, None, &[])], &dest, CollisionPolicy::Skip);

    let summary = log.summary();
    assert_eq!(summary.copied, 1);
    assert_eq!(summary.skipped_duplicates, 1);
    assert_eq!(summary.collisions, 0);
    assert_eq!(log.duplicates.len(), 1);
    assert!(log.collisions.is_empty());
    assert_eq!(file_names(&dest.join("unknown_date")).len(), 1);

    let copied = log
        .report
        .iter()
        .find(|r| matches!(r, ReportRecord::Copied { .. }))
        .unwrap();
    assert_eq!(log.duplicates[0].existing, copied.plan().dst);
}

#[test]
fn test_same_name_duplicates_in_one_run_are_skipped() {
    let (_tmp, src, dest) = roots();
    let first = write(&src.join("dcim1").join("a.jpg"), "same bytes");
    let second = write(&src.join("dcim2").join("a.jpg"), "same bytes");

    let log = run(
        &[
            item(&first, Some("2024:05:01 10:00:00"), &[]),
            item(&second, Some("2024:05:01 10:00:00"), &[]),
        ],
        &dest,
        CollisionPolicy::Skip,
    );

    let mut statuses: Vec<_> = log.report.iter().map(|r| r.status()).collect();
    statuses.sort();
    assert_eq!(statuses, vec!["copied", "skipped_duplicate"]);
    assert_eq!(log.duplicates.len(), 1);
    assert_eq!(
        log.duplicates[0].existing,
        dest.join("2024-05-01 -").join("a.jpg")
    );
    assert_eq!(file_names(&dest.join("2024-05-01 -")), vec!["a.jpg"]);
}

#[test]
fn test_existing_identical_file_is_not_rewritten() {
    let (_tmp, src, dest) = roots();
    let a = write(&src.join("a.jpg"), "pixels");
    let existing = write(&dest.join("2024-05-01 -").join("a.jpg"), "pixels");
    let before = fs::metadata(&existing).unwrap().modified().unwrap();

    let log = run(
        &[item(&a, Some("2024:05:01 10:00:00"), &[])],
        &dest,
        CollisionPolicy::Skip,
    );

    assert_eq!(log.report.len(), 1);
    assert_eq!(log.report[0].status(), "already_present_same_content");
    assert!(log.duplicates.is_empty());
    assert_eq!(fs::metadata(&existing).unwrap().modified().unwrap(), before);
    assert_eq!(file_names(&dest.join("2024-05-01 -")), vec!["a.jpg"]);
}

#[test]
fn test_content_elsewhere_in_destination_is_a_duplicate() {
    let (_tmp, src, dest) = roots();
    let a = write(&src.join("a.jpg"), "pixels");
    write(&dest.join("old-import").join("renamed.jpg"), "pixels");

    let log = run(
        &[item(&a, Some("2024:05:01 10:00:00"), &[])],
        &dest,
        CollisionPolicy::Skip,
    );

    assert_eq!(log.report[0].status(), "skipped_duplicate");
    assert!(log.duplicates[0].existing.ends_with("old-import/renamed.jpg"));
    assert!(!dest.join("2024-05-01 -").join("a.jpg").exists());
}

#[test]
fn test_rename_policy_adds_numeric_suffix() {
    let (_tmp, src, dest) = roots();
    let a = write(&src.join("a.jpg"), "new content");
    let day = dest.join("2024-05-01 -");
    write(&day.join("a.jpg"), "old content");

    let log = run(
        &[item(&a, Some("2024:05:01 10:00:00"), &[])],
        &dest,
        CollisionPolicy::Rename,
    );

    assert_eq!(log.report[0].status(), "collision_deferred");
    assert_eq!(log.applied.len(), 1);
    assert_eq!(log.applied[0].final_dst(), Some(day.join("a_(1).jpg").as_path()));
    assert_eq!(fs::read_to_string(day.join("a.jpg")).unwrap(), "old content");
    assert_eq!(fs::read_to_string(day.join("a_(1).jpg")).unwrap(), "new content");
}

#[test]
fn test_sidecar_follows_renamed_primary() {
    let (_tmp, src, dest) = roots();
    let photo = write(&src.join("photo.jpg"), "new photo");
    let xmp = write(&src.join("photo.xmp"), "new edits");
    let day = dest.join("2024-05-01 -");
    write(&day.join("photo.jpg"), "someone else's photo");

    let log = run(
        &[item(&photo, Some("2024:05:01 10:00:00"), &[&xmp])],
        &dest,
        CollisionPolicy::Rename,
    );

    assert_eq!(
        file_names(&day),
        vec!["photo.jpg", "photo_(1).jpg", "photo_(1).xmp"]
    );
    assert_eq!(fs::read_to_string(day.join("photo_(1).xmp")).unwrap(), "new edits");
    assert_eq!(log.collisions.len(), 2);
    assert_eq!(log.collisions[0].plan.kind, PlanKind::Primary);
    assert_eq!(log.collisions[1].cause, CollisionCause::PrimaryCollided);
    assert!(log
        .applied
        .iter()
        .all(|a| matches!(a, AppliedCollision::CopiedAfterCollision { .. })));
}

#[test]
fn test_sidecar_rename_when_both_collide() {
    let (_tmp, src, dest) = roots();
    let photo = write(&src.join("photo.jpg"), "new photo");
    let xmp = write(&src.join("photo.xmp"), "new edits");
    let day = dest.join("2024-05-01 -");
    write(&day.join("photo.jpg"), "old photo");
    write(&day.join("photo.xmp"), "old edits");
    write(&day.join("photo_(1).jpg"), "another old photo");

    run(
        &[item(&photo, Some("2024:05:01 10:00:00"), &[&xmp])],
        &dest,
        CollisionPolicy::Rename,
    );

    assert_eq!(fs::read_to_string(day.join("photo_(2).jpg")).unwrap(), "new photo");
    assert_eq!(fs::read_to_string(day.join("photo_(2).xmp")).unwrap(), "new edits");
    assert_eq!(fs::read_to_string(day.join("photo.xmp")).unwrap(), "old edits");
}

#[test]
fn test_conflicts_policy_uses_conflicts_folder() {
    let (_tmp, src, dest) = roots();
    let a = write(&src.join("a.jpg"), "incoming");
    let day = dest.join("2024-05-01 -");
    write(&day.join("a.jpg"), "original");

    let log = run(
        &[item(&a, Some("2024:05:01 10:00:00"), &[])],
        &dest,
        CollisionPolicy::Conflicts,
    );

    assert_eq!(log.report[0].status(), "collision_deferred");
    match &log.applied[0] {
        AppliedCollision::CopiedAfterCollision { final_dst, .. } => {
            assert_eq!(final_dst, &dest.join("conflicts").join("a.jpg"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(fs::read_to_string(day.join("a.jpg")).unwrap(), "original");
    assert_eq!(
        fs::read_to_string(dest.join("conflicts").join("a.jpg")).unwrap(),
        "incoming"
    );
}

#[test]
fn test_skip_policy_touches_nothing() {
    let (_tmp, src, dest) = roots();
    let photo = write(&src.join("photo.jpg"), "incoming");
    let xmp = write(&src.join("photo.xmp"), "edits");
    let day = dest.join("2024-05-01 -");
    write(&day.join("photo.jpg"), "original");

    let log = run(
        &[item(&photo, Some("2024:05:01 10:00:00"), &[&xmp])],
        &dest,
        CollisionPolicy::Skip,
    );

    assert_eq!(file_names(&day), vec!["photo.jpg"]);
    assert_eq!(fs::read_to_string(day.join("photo.jpg")).unwrap(), "original");
    assert_eq!(log.summary().skipped_collisions, 2);
    assert!(!dest.join("conflicts").exists());
}

#[test]
fn test_same_content_colliding_twice_is_copied_once() {
    let (_tmp, src, dest) = roots();
    let first = write(&src.join("dcim1").join("a.jpg"), "incoming");
    let second = write(&src.join("dcim2").join("a.jpg"), "incoming");
    let day = dest.join("2024-05-01 -");
    write(&day.join("a.jpg"), "original");

    let log = run(
        &[
            item(&first, Some("2024:05:01 10:00:00"), &[]),
            item(&second, Some("2024:05:01 11:00:00"), &[]),
        ],
        &dest,
        CollisionPolicy::Rename,
    );

    assert_eq!(log.collisions.len(), 2);
    let statuses: Vec<_> = log
        .applied
        .iter()
        .map(|a| match a {
            AppliedCollision::CopiedAfterCollision { .. } => "copied",
            AppliedCollision::SkippedDuplicateAfterPolicy { .. } => "duplicate",
            _ => "other",
        })
        .collect();
    assert_eq!(statuses, vec!["copied", "duplicate"]);
    assert_eq!(file_names(&day), vec!["a.jpg", "a_(1).jpg"]);
}

#[test]
fn test_unreadable_source_does_not_stop_the_run() {
    let (_tmp, src, dest) = roots();
    let good = write(&src.join("good.jpg"), "fine");
    let missing = src.join("vanished.jpg");

    let log = run(
        &[item(&missing, None, &[]), item(&good, None, &[])],
        &dest,
        CollisionPolicy::Skip,
    );

    assert_eq!(log.report.len(), 2);
    let summary = log.summary();
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.copied, 1);
    match log.record_for(&missing).unwrap() {
        ReportRecord::Error { hash, error, .. } => {
            assert!(hash.is_none());
            assert!(!error.is_empty());
        }
        other => panic!("unexpected record {:?}", other),
    }
}

#[test]
fn test_plans_run_primary_first_regardless_of_input_order() {
    let (_tmp, src, dest) = roots();
    let photo = write(&src.join("photo.jpg"), "photo");
    let xmp = write(&src.join("photo.xmp"), "edits");
    let (mut plans, _) = plan_copies(&[item(&photo, None, &[&xmp])], &dest);
    plans.reverse();
    assert_eq!(plans[0].kind, PlanKind::Sidecar);

    let mut index = build_index(&dest, &SilentReporter).unwrap();
    let log = CommitEngine::new(&dest, CollisionPolicy::Skip)
        .commit(&plans, &mut index, &SilentReporter)
        .unwrap();

    assert_eq!(log.report[0].plan().kind, PlanKind::Primary);
    assert_eq!(log.report[1].plan().kind, PlanKind::Sidecar);
}

#[test]
fn test_every_plan_gets_exactly_one_report_record() {
    let (_tmp, src, dest) = roots();
    let a = write(&src.join("a.jpg"), "a");
    let a_xmp = write(&src.join("a.xmp"), "a edits");
    let b = write(&src.join("b.jpg"), "a");
    let c = write(&src.join("c.jpg"), "c");
    write(&dest.join("unknown_date").join("c.jpg"), "not c");

    let items = [
        item(&a, None, &[&a_xmp]),
        item(&b, None, &[]),
        item(&c, None, &[]),
    ];
    let (plans, _) = plan_copies(&items, &dest);
    let mut index = build_index(&dest, &SilentReporter).unwrap();
    let log = CommitEngine::new(&dest, CollisionPolicy::Conflicts)
        .commit(&plans, &mut index, &SilentReporter)
        .unwrap();

    assert_eq!(log.report.len(), plans.len());
    for plan in &plans {
        let CopyPlan { src, .. } = plan;
        assert_eq!(
            log.report.iter().filter(|r| &r.plan().src == src).count(),
            1
        );
    }
    assert_eq!(log.applied.len(), log.collisions.len());
}

#[test]
fn test_sidecar_follows_primary_into_conflicts() {
    let (_tmp, src, dest) = roots();
    let photo = write(&src.join("photo.jpg"), "new photo");
    let xmp = write(&src.join("photo.xmp"), "new edits");
    write(&dest.join("2024-05-01 -").join("photo.jpg"), "old photo");
    write(&dest.join("conflicts").join("photo.jpg"), "older conflict");

    let log = run(
        &[item(&photo, Some("2024:05:01 10:00:00"), &[&xmp])],
        &dest,
        CollisionPolicy::Conflicts,
    );

    let conflicts = dest.join("conflicts");
    assert_eq!(
        file_names(&conflicts),
        vec!["photo.jpg", "photo_(1).jpg", "photo_(1).xmp"]
    );
    assert_eq!(fs::read_to_string(conflicts.join("photo_(1).xmp")).unwrap(), "new edits");
    assert_eq!(log.summary().copied_after_collision, 2);
    assert!(!dest.join("2024-05-01 -").join("photo.xmp").exists());
}

#[test]
fn test_unreadable_destination_is_a_collision_with_unknown_hash() {
    let (_tmp, src, dest) = roots();
    let a = write(&src.join("a.jpg"), "incoming");
    let day = dest.join("2024-05-01 -");
    // A directory sits where the file would go; reading it as a file fails.
    fs::create_dir_all(day.join("a.jpg")).unwrap();

    let log = run(
        &[item(&a, Some("2024:05:01 10:00:00"), &[])],
        &dest,
        CollisionPolicy::Rename,
    );

    assert_eq!(log.report[0].status(), "collision_deferred");
    assert_eq!(log.collisions[0].dst_hash, None);
    assert_eq!(log.collisions[0].cause, CollisionCause::ExistingContentDiffers);
    let json = serde_json::to_value(&log.collisions).unwrap();
    assert!(json[0]["dst_hash"].is_null());
    assert_eq!(log.applied[0].final_dst(), Some(day.join("a_(1).jpg").as_path()));
    assert_eq!(fs::read_to_string(day.join("a_(1).jpg")).unwrap(), "incoming");
}

#[test]
fn test_exhausted_name_space_fails_only_that_file() {
    let (_tmp, src, dest) = roots();
    let day = dest.join("2024-05-01 -");
    write(&day.join("a.jpg"), "taken");
    for i in 1..=MAX_DISAMBIGUATION {
        fs::write(day.join(format!("a_({}).jpg", i)), format!("taken {}", i)).unwrap();
    }
    write(&day.join("b.jpg"), "old b");
    let a = write(&src.join("a.jpg"), "new a");
    let b = write(&src.join("b.jpg"), "new b");

    let log = run(
        &[
            item(&a, Some("2024:05:01 10:00:00"), &[]),
            item(&b, Some("2024:05:01 10:00:00"), &[]),
        ],
        &dest,
        CollisionPolicy::Rename,
    );

    let summary = log.summary();
    assert_eq!(summary.errors, 1);
    assert_eq!(summary.copied_after_collision, 1);
    let failed = log
        .applied
        .iter()
        .find(|o| matches!(o, AppliedCollision::Error { .. }))
        .unwrap();
    match failed {
        AppliedCollision::Error { collision, error } => {
            assert_eq!(collision.plan.src, a);
            assert!(!error.is_empty());
        }
        _ => unreachable!(),
    }
    assert_eq!(fs::read_to_string(day.join("b_(1).jpg")).unwrap(), "new b");
}
