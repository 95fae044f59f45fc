use markerguard_core::{
    CanonicalKey, CaptureOutcome, CommandRouter, Decision, DenyReason, Effect, GuardConfig,
    ObjectKind, OwnerId, OwnershipRegistry, PrivilegedSet, DEFAULT_SCOPE,
};
use markerguard_test_utils::{
    fresh_identity, MemoryMarkerSource, MemoryOwnershipStore, RecordingNotifier,
    SharedOwnershipStore,
};
use std::sync::Arc;

struct Harness {
    router: CommandRouter,
    source: Arc<MemoryMarkerSource>,
    store: Arc<MemoryOwnershipStore>,
    registry: Arc<OwnershipRegistry>,
    notifier: Arc<RecordingNotifier>,
    admin: OwnerId,
}

fn harness_with(config: &GuardConfig) -> Harness {
    let source = MemoryMarkerSource::new();
    source.insert(DEFAULT_SCOPE, ObjectKind::Point, "home", Some("Home"));
    source.insert("towns", ObjectKind::Area, "plaza", Some("Plaza"));

    let store = MemoryOwnershipStore::new();
    let registry = Arc::new(OwnershipRegistry::new(Box::new(SharedOwnershipStore(
        Arc::clone(&store),
    ))));
    let notifier = RecordingNotifier::new();
    let admin = fresh_identity();

    let router = CommandRouter::new(
        config,
        source.clone(),
        Arc::clone(&registry),
        Arc::new(PrivilegedSet::new([admin.clone()])),
        notifier.clone(),
    );

    Harness {
        router,
        source,
        store,
        registry,
        notifier,
        admin,
    }
}

fn harness() -> Harness {
    harness_with(&GuardConfig::new())
}

fn home() -> CanonicalKey {
    CanonicalKey::build(ObjectKind::Point, None, "home")
}

fn plaza() -> CanonicalKey {
    CanonicalKey::build(ObjectKind::Area, Some("towns"), "plaza")
}

#[test]
fn non_owner_delete_is_cancelled() {
    let h = harness();
    let (owner, intruder) = (fresh_identity(), fresh_identity());
    h.registry.record(home(), owner.clone()).unwrap();
    let saves_before = h.store.save_count();

    let decision = h.router.handle("/dmarker delete id:home", &intruder);

    assert!(decision.is_cancelled());
    assert!(matches!(decision, Decision::Deny(DenyReason::NotOwner(ref k)) if *k == home()));
    assert!(h.registry.is_owner(&home(), &owner));
    assert_eq!(h.store.save_count(), saves_before);
    assert_eq!(
        h.notifier.notices(),
        vec![(intruder, "You can only delete markers you created.".to_string())]
    );
}

#[test]
fn owner_delete_releases_record() {
    let h = harness();
    let owner = fresh_identity();
    h.registry.record(home(), owner.clone()).unwrap();

    let decision = h.router.handle("dmarker delete Home", &owner);

    assert!(matches!(decision, Decision::Allow(Effect::OwnershipReleased(ref k)) if *k == home()));
    assert!(!h.registry.contains(&home()));
    assert_eq!(h.store.last_saved(), Some(Vec::new()));
    assert_eq!(h.notifier.count(), 0);
}

#[test]
fn privileged_delete_always_allowed() {
    let h = harness();
    let owner = fresh_identity();
    h.registry.record(home(), owner.clone()).unwrap();

    let decision = h.router.handle("/dmarker delete id:home", &h.admin);
    assert!(matches!(decision, Decision::Allow(Effect::None)));
    assert!(h.registry.is_owner(&home(), &owner));

    // Even objects the store does not know about
    let decision = h.router.handle("/dmarker delete id:ghost", &h.admin);
    assert!(!decision.is_cancelled());
}

#[test]
fn update_checks_owner_without_changing_ownership() {
    let h = harness();
    let (owner, intruder) = (fresh_identity(), fresh_identity());
    h.registry.record(plaza(), owner.clone()).unwrap();

    let denied = h
        .router
        .handle("/dmarker updatearea id:plaza set:towns label:Square", &intruder);
    assert!(denied.is_cancelled());
    assert_eq!(h.notifier.notices().len(), 1);
    assert_eq!(h.notifier.notices()[0].0, intruder);

    let allowed = h
        .router
        .handle("/dmarker updatearea id:plaza set:towns label:Square", &owner);
    assert!(matches!(allowed, Decision::Allow(Effect::None)));
    assert_eq!(h.notifier.count(), 1);

    assert_eq!(h.registry.snapshot(), vec![(plaza(), owner)]);
}

#[test]
fn delete_of_unresolved_object_is_denied() {
    let h = harness();
    let decision = h.router.handle("/dmarker delete id:nowhere", &fresh_identity());
    assert!(matches!(decision, Decision::Deny(DenyReason::Unresolved)));
    assert_eq!(h.notifier.count(), 1);
}

#[test]
fn delete_of_unowned_object_is_denied() {
    let h = harness();
    let decision = h.router.handle("/dmarker delete id:home", &fresh_identity());
    assert!(matches!(decision, Decision::Deny(DenyReason::NotOwner(_))));
}

#[test]
fn delete_without_target_passes_through() {
    let h = harness();
    let decision = h.router.handle("/dmarker delete", &fresh_identity());
    assert!(matches!(decision, Decision::Allow(Effect::None)));
    assert_eq!(h.notifier.count(), 0);
}

#[test]
fn update_of_unresolved_object_is_allowed() {
    let h = harness();
    h.source.set_absent();
    let decision = h.router.handle("/dmarker update id:home", &fresh_identity());
    assert!(!decision.is_cancelled());
}

#[test]
fn unrelated_commands_are_ignored() {
    let h = harness();
    let actor = fresh_identity();
    for text in [
        "",
        "/dmarker",
        "/home set",
        "/dmarker list",
        "/dmarker addset id:towns",
        "/dmarker icons",
    ] {
        assert!(
            matches!(h.router.handle(text, &actor), Decision::Ignore),
            "{text:?} should be ignored"
        );
    }
}

#[test]
fn command_name_is_case_insensitive() {
    let h = harness();
    let decision = h.router.handle("/DMarker DELETE id:home", &fresh_identity());
    assert!(decision.is_cancelled());
}

#[test]
fn scope_delete_requires_privilege() {
    let h = harness();
    let owner = fresh_identity();
    h.registry.record(plaza(), owner.clone()).unwrap();

    let denied = h.router.handle("/dmarker deleteset id:towns", &owner);
    assert!(matches!(denied, Decision::Deny(DenyReason::NotPrivileged)));
    assert!(h.registry.contains(&plaza()));
    assert_eq!(
        h.notifier.notices(),
        vec![(owner, "You can only delete markers you created.".to_string())]
    );
}

#[test]
fn privileged_scope_delete_purges_records() {
    let h = harness();
    h.registry.record(plaza(), fresh_identity()).unwrap();
    h.registry.record(home(), fresh_identity()).unwrap();

    let decision = h.router.handle("/dmarker deleteset towns", &h.admin);

    match decision {
        Decision::Allow(Effect::ScopePurged { scope, removed }) => {
            assert_eq!(scope, "towns");
            assert_eq!(removed, 1);
        }
        other => panic!("unexpected decision {other:?}"),
    }
    assert!(!h.registry.contains(&plaza()));
    assert!(h.registry.contains(&home()));
}

#[test]
fn scope_purge_reports_removed_records_when_flush_fails() {
    let h = harness();
    h.registry.record(plaza(), fresh_identity()).unwrap();
    h.store.set_failing(true);

    let decision = h.router.handle("/dmarker deleteset id:towns", &h.admin);

    assert!(matches!(
        decision,
        Decision::Allow(Effect::ScopePurged { removed: 1, .. })
    ));
    assert!(h.registry.is_empty());
}

#[test]
fn owner_delete_proceeds_when_flush_fails() {
    let h = harness();
    let owner = fresh_identity();
    h.registry.record(home(), owner.clone()).unwrap();
    h.store.set_failing(true);

    let decision = h.router.handle("/dmarker delete id:home", &owner);

    assert!(matches!(decision, Decision::Allow(Effect::OwnershipReleased(_))));
    assert!(!h.registry.contains(&home()));
    assert_eq!(h.notifier.count(), 0);
}

#[test]
fn scope_purge_can_be_disabled() {
    let h = harness_with(&GuardConfig::new().with_purge_scope_on_delete(false));
    h.registry.record(plaza(), fresh_identity()).unwrap();

    let decision = h.router.handle("/dmarker deleteset id:towns", &h.admin);

    assert!(matches!(decision, Decision::Allow(Effect::None)));
    assert!(h.registry.contains(&plaza()));
}

#[test]
fn custom_deny_message_is_sent() {
    let mut config = GuardConfig::new();
    config.deny_message = "Not yours.".to_string();
    let h = harness_with(&config);

    let actor = fresh_identity();
    h.router.handle("/dmarker delete id:home", &actor);

    assert_eq!(h.notifier.notices(), vec![(actor, "Not yours.".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn create_schedules_capture() {
    let h = harness();
    let creator = fresh_identity();

    let decision = h.router.handle("/dmarker add Home", &creator);

    let Decision::Allow(Effect::CaptureScheduled(handle)) = decision else {
        panic!("expected a scheduled capture");
    };
    assert_eq!(handle.await.unwrap(), CaptureOutcome::Captured(home()));
    assert!(h.registry.is_owner(&home(), &creator));
}

#[test]
fn create_without_target_is_ignored() {
    let h = harness();
    assert!(matches!(
        h.router.handle("/dmarker add", &fresh_identity()),
        Decision::Ignore
    ));
}
