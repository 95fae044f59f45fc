use markerguard_core::{
    CanonicalKey, CommandRouter, Decision, Effect, GuardConfig, LoadReport, MarkerSource,
    ObjectKind, OwnerId, OwnershipRegistry, OwnershipStore, PrivilegedSet, TracingNotifier,
    YamlMarkerSource, YamlOwnershipFile,
};
use markerguard_test_utils::{fresh_identity, write_markers_file};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const LEGACY_OWNERSHIP: &str = r#"
settings:
  notify: true
owner:
  "marker:spawn": player-1
  "marker:markers:town":
    hall: player-2
  "line:bad scope:road": player-3
  "marker:": player-4
"owner.circle:towns:ring": player-5
"#;

#[test]
fn legacy_file_migrates_on_first_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ownership.yml");
    std::fs::write(&path, LEGACY_OWNERSHIP).unwrap();

    let registry = OwnershipRegistry::new(Box::new(YamlOwnershipFile::new(&path)));
    let report = registry.load().unwrap();
    assert_eq!(
        report,
        LoadReport {
            loaded: 4,
            dropped: 1,
            skipped_empty: 0
        }
    );
    registry.flush().unwrap();

    let entries = YamlOwnershipFile::new(&path).load().unwrap();
    assert_eq!(
        entries,
        vec![
            ("marker:markers:spawn".to_string(), "player-1".to_string()),
            ("marker:markers:town.hall".to_string(), "player-2".to_string()),
            ("line:markers:road".to_string(), "player-3".to_string()),
            ("circle:towns:ring".to_string(), "player-5".to_string()),
        ]
    );

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("notify: true"));
    assert!(!text.contains("owner.circle"));
}

#[test]
fn ownership_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("ownership.yml");
    let key = CanonicalKey::build(ObjectKind::Area, Some("towns"), "plaza");
    let owner = fresh_identity();

    {
        let registry = OwnershipRegistry::new(Box::new(YamlOwnershipFile::new(&path)));
        registry.load().unwrap();
        registry.record(key.clone(), owner.clone()).unwrap();
    }

    let registry = OwnershipRegistry::new(Box::new(YamlOwnershipFile::new(&path)));
    assert_eq!(registry.load().unwrap().loaded, 1);
    assert_eq!(registry.owner_of(&key), Some(owner));
}

#[test]
fn router_over_files() {
    let dir = tempfile::tempdir().unwrap();
    let markers = dir.path().join("markers.yml");
    let ownership = dir.path().join("ownership.yml");
    write_markers_file(
        &markers,
        &[("markers", "spawn", "Spawn &amp; Hub"), ("towns", "well", "Well")],
    );
    std::fs::write(&ownership, "owner:\n  \"marker:spawn\": player-1\n").unwrap();

    let config = GuardConfig::new()
        .with_markers_path(&markers)
        .with_ownership_path(&ownership);
    let registry = Arc::new(OwnershipRegistry::new(Box::new(YamlOwnershipFile::new(
        &ownership,
    ))));
    registry.load().unwrap();

    let router = CommandRouter::new(
        &config,
        Arc::new(YamlMarkerSource::new(&markers)),
        Arc::clone(&registry),
        Arc::new(PrivilegedSet::new(["admin"])),
        Arc::new(TracingNotifier),
    );

    let intruder = OwnerId::new("player-2");
    assert!(router
        .handle(r#"/dmarker delete label:"spawn & hub""#, &intruder)
        .is_cancelled());

    let owner = OwnerId::new("player-1");
    let decision = router.handle(r#"/dmarker delete label:"Spawn &amp; Hub""#, &owner);
    assert!(matches!(decision, Decision::Allow(Effect::OwnershipReleased(_))));

    let persisted = YamlOwnershipFile::new(&ownership).load().unwrap();
    assert!(persisted.is_empty());
}

#[test]
fn labels_with_quotes_and_backslashes_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let markers = dir.path().join("markers.yml");
    write_markers_file(
        &markers,
        &[
            ("markers", "sign", r#"The "Old" Sign"#),
            ("markers", "path", r"C:\maps"),
        ],
    );

    let view = YamlMarkerSource::new(&markers).read().unwrap().unwrap();
    let points = view.bucket("markers", ObjectKind::Point).unwrap();
    assert_eq!(points["sign"].label.as_deref(), Some(r#"The "Old" Sign"#));
    assert_eq!(points["path"].label.as_deref(), Some(r"C:\maps"));
}
