use apex_database::Database;
use apex_domain::ids::DomainId;
use apex_domain::ladder::TierLevel;
use apex_event_bus::EventBus;
use apex_kernel::clock::ManualClock;
use apex_ladder::{
    LadderChange, LadderChanged, LadderError, LadderService, LadderViolation, ThresholdSpec,
    TierSpec, VersionState, seed, tier_id,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
}

fn setup() -> (LadderService, ManualClock, Database, EventBus) {
    let db = Database::builder().namespace("test").init().unwrap();
    let events = EventBus::new();
    let clock = ManualClock::new(start());
    let service = LadderService::new(db.clone(), events.clone(), clock.shared());
    (service, clock, db, events)
}

fn tier(level: u8, max_slots: Option<u32>) -> TierSpec {
    TierSpec {
        level,
        name: format!("Tier {level}"),
        max_slots,
        yearly_cost: u64::from(level) * 1000,
        features: vec!["profile_listing".to_owned()],
    }
}

fn specs(ranges: &[(u8, u8, u8)]) -> Vec<ThresholdSpec> {
    ranges.iter().map(|&(level, min, max)| ThresholdSpec::new(level, min, max)).collect()
}

/// A three tier domain with `[0, 49] [50, 79] [80, 100]` in force from `start()`.
fn three_tier_domain(service: &LadderService) -> DomainId {
    let domain = service.create_domain("Systems Design", "Distributed systems").unwrap();
    service.add_tier(&domain.id, tier(1, None)).unwrap();
    service.add_tier(&domain.id, tier(2, Some(10))).unwrap();
    service.add_tier(&domain.id, tier(3, Some(2))).unwrap();
    service
        .publish_thresholds(
            &domain.id,
            &specs(&[(1, 0, 49), (2, 50, 79), (3, 80, 100)]),
            None,
        )
        .unwrap();
    domain.id
}

#[test]
fn domain_names_are_unique_ignoring_case() {
    let (service, ..) = setup();

    let domain = service.create_domain("  Web Development ", "").unwrap();
    assert_eq!(domain.id.as_str(), "domain:web-development");
    assert_eq!(domain.name, "Web Development");

    let err = service.create_domain("web development", "again").unwrap_err();
    assert!(matches!(err, LadderError::DomainExists { .. }), "{err}");
    assert_eq!(service.list_domains().len(), 1);
}

#[test]
fn blank_domain_name_is_rejected() {
    let (service, ..) = setup();
    let err = service.create_domain("   ", "").unwrap_err();
    assert_eq!(err.code(), "invalid_request");
}

#[test]
fn tiers_are_added_one_level_at_a_time() {
    let (service, ..) = setup();
    let domain = service.create_domain("Rust", "").unwrap();

    let err = service.add_tier(&domain.id, tier(2, Some(5))).unwrap_err();
    assert!(err.to_string().contains("the next tier must be level 1"), "{err}");

    let entry = service.add_tier(&domain.id, tier(1, None)).unwrap();
    assert_eq!(entry.id.as_str(), "tier:rust-1");

    let top = service.add_tier(&domain.id, tier(2, Some(5))).unwrap();
    assert_eq!(top.id.as_str(), "tier:rust-2");
    assert_eq!(service.list_tiers(&domain.id).unwrap().len(), 2);
}

#[test]
fn entry_tier_must_be_unbounded_and_others_need_a_slot() {
    let (service, ..) = setup();
    let domain = service.create_domain("Go", "").unwrap();

    let err = service.add_tier(&domain.id, tier(1, Some(100))).unwrap_err();
    assert!(err.to_string().contains("unbounded"), "{err}");

    service.add_tier(&domain.id, tier(1, None)).unwrap();
    let err = service.add_tier(&domain.id, tier(2, Some(0))).unwrap_err();
    assert!(err.to_string().contains("at least one slot"), "{err}");
}

#[test]
fn unknown_tier_features_are_rejected() {
    let (service, ..) = setup();
    let domain = service.create_domain("Kotlin", "").unwrap();

    let mut spec = tier(1, None);
    spec.features.push("free_lunch".to_owned());

    let err = service.add_tier(&domain.id, spec).unwrap_err();
    assert!(err.to_string().contains("free_lunch"), "{err}");
    assert!(service.list_tiers(&domain.id).unwrap().is_empty());
}

#[test]
fn new_tier_leaves_the_ladder_incomplete_until_thresholds_are_published() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);
    service.add_tier(&id, tier(4, Some(1))).unwrap();

    let err = service.active_ladder(&id, None).unwrap_err();
    let LadderError::IncompleteLadder { violations, .. } = &err else {
        panic!("expected an incomplete ladder, got {err}");
    };
    assert_eq!(violations, &vec![LadderViolation::MissingThreshold { tier_level: 4 }]);
}

#[test]
fn invalid_proposals_store_nothing() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);

    let proposal = specs(&[(1, 0, 44), (2, 50, 79), (3, 80, 100)]);

    let err = service.validate_proposal(&id, &proposal).unwrap_err();
    let LadderError::InvalidLadder { source, .. } = &err else {
        panic!("expected an invalid ladder, got {err}");
    };
    assert_eq!(
        source.violations,
        vec![LadderViolation::Gap { from: 45, to: 49, lower: Some(1), upper: Some(2) }]
    );

    assert!(service.publish_thresholds(&id, &proposal, None).is_err());
    assert_eq!(service.threshold_history(&id, 1).unwrap().len(), 1);
}

#[test]
fn proposals_for_missing_levels_are_rejected() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);

    let err = service.validate_proposal(&id, &specs(&[(9, 0, 100)])).unwrap_err();
    assert_eq!(err.code(), "invalid_request");
}

#[test]
fn scheduled_thresholds_take_over_on_their_effective_date() {
    let (service, clock, ..) = setup();
    let id = three_tier_domain(&service);
    let switch = start() + Duration::days(7);

    service
        .publish_thresholds(
            &id,
            &specs(&[(1, 0, 59), (2, 60, 84), (3, 85, 100)]),
            Some(switch),
        )
        .unwrap();

    let ladder = service.active_ladder(&id, None).unwrap();
    assert_eq!(ladder.tier_for(55.0).tier.level.get(), 2);

    let history = service.threshold_history(&id, 2).unwrap();
    let states: Vec<_> = history.iter().map(|version| version.state).collect();
    assert_eq!(states, vec![VersionState::Current, VersionState::Scheduled]);

    clock.advance(Duration::days(7));

    let ladder = service.active_ladder(&id, None).unwrap();
    assert_eq!(ladder.tier_for(55.0).tier.level.get(), 1);
    assert_eq!(ladder.tier_for(85.0).tier.level.get(), 3);

    let history = service.threshold_history(&id, 2).unwrap();
    let states: Vec<_> = history.iter().map(|version| version.state).collect();
    assert_eq!(states, vec![VersionState::Superseded, VersionState::Current]);
}

#[test]
fn past_effective_dates_are_refused() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);

    let err = service
        .publish_thresholds(
            &id,
            &specs(&[(1, 0, 49), (2, 50, 79), (3, 80, 100)]),
            Some(start() - Duration::days(1)),
        )
        .unwrap_err();
    assert!(err.to_string().contains("precedes the latest version"), "{err}");
}

#[test]
fn inactive_version_withdraws_a_tier() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);

    let withdraw_top = ThresholdSpec { is_active: false, ..ThresholdSpec::new(3, 80, 100) };
    service
        .publish_thresholds(
            &id,
            &specs(&[(1, 0, 49), (2, 50, 100)]),
            None,
        )
        .unwrap();

    let ladder = service.active_ladder(&id, None).unwrap();
    assert_eq!(ladder.rungs().len(), 2);
    assert_eq!(ladder.tier_for(95.0).tier.level.get(), 2);

    let history = service.threshold_history(&id, 3).unwrap();
    assert_eq!(history.last().map(|version| version.state), Some(VersionState::Disabled));
}

#[test]
fn shared_boundaries_go_to_the_upper_tier() {
    let (service, ..) = setup();
    let domain = service.create_domain("Networking", "").unwrap();
    service.add_tier(&domain.id, tier(1, None)).unwrap();
    service.add_tier(&domain.id, tier(2, Some(3))).unwrap();
    service
        .publish_thresholds(&domain.id, &specs(&[(1, 0, 40), (2, 40, 100)]), None)
        .unwrap();

    let ladder = service.active_ladder(&domain.id, None).unwrap();
    assert_eq!(ladder.tier_for(39.99).tier.level.get(), 1);
    assert_eq!(ladder.tier_for(40.0).tier.level.get(), 2);
    assert_eq!(ladder.progress_to_next(&ladder.entry().tier.id, 20.0), Some(0.5));
}

#[test]
fn removing_a_domain_frees_its_name() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);

    service.remove_domain(&id).unwrap();
    assert!(matches!(service.domain(&id), Err(LadderError::DomainNotFound { .. })));
    assert!(service.find_domain("systems design").is_none());

    let again = service.create_domain("Systems Design", "").unwrap();
    assert_eq!(again.id, id);
}

#[test]
fn description_updates_are_trimmed() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);

    let domain = service.update_description(&id, "  Large scale systems  ").unwrap();
    assert_eq!(domain.description, "Large scale systems");
}

#[tokio::test]
async fn ladder_changes_are_broadcast() {
    let (service, _, _, events) = setup();
    let mut rx = events.subscribe::<LadderChanged>().unwrap();

    let domain = service.create_domain("Haskell", "").unwrap();
    service.add_tier(&domain.id, tier(1, None)).unwrap();

    let created = rx.recv().await.unwrap();
    assert_eq!(created.domain_id, domain.id);
    assert_eq!(created.change, LadderChange::DomainCreated);

    let added = rx.recv().await.unwrap();
    assert_eq!(added.change, LadderChange::TierAdded { level: 1 });
    assert_eq!(added.at, start());
}

#[test]
fn seeds_apply_once() {
    let (service, _, db, _) = setup();

    let first = seed::run(&db, &service, None).unwrap();
    assert_eq!(first.applied, vec!["ladder:0001_core_domains", "ladder:0002_dsa_recalibration"]);

    let second = seed::run(&db, &service, None).unwrap();
    assert!(second.applied.is_empty());
    assert_eq!(second.skipped.len(), 2);

    let names: Vec<_> = service.list_domains().into_iter().map(|domain| domain.name).collect();
    assert_eq!(names, vec!["DSA", "SQL", "Web Development"]);
}

#[test]
fn seeded_dsa_ladder_recalibrates_in_2027() {
    let (service, _, db, _) = setup();
    seed::run(&db, &service, None).unwrap();
    let dsa = service.find_domain("dsa").unwrap();

    let now = service.active_ladder(&dsa, None).unwrap();
    assert_eq!(now.rungs().len(), 4);
    assert_eq!(now.tier_for(82.0).tier.name, "Elite");
    assert_eq!(now.entry().tier.id, tier_id(&dsa, TierLevel::ENTRY));
    assert_eq!(now.entry().tier.max_slots, None);

    let later = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
    let recalibrated = service.active_ladder(&dsa, Some(later)).unwrap();
    assert_eq!(recalibrated.tier_for(82.0).tier.name, "Advanced");
}

#[test]
fn edited_seed_documents_are_refused() {
    let (service, _, db, _) = setup();
    seed::run(&db, &service, None).unwrap();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("0003_rust.toml"),
        r#"
[[domains]]
name = "Rust"

[[domains.tiers]]
level = 1
name = "Foundation"
min_score = 0
max_score = 100
"#,
    )
    .unwrap();

    let report = seed::run(&db, &service, Some(dir.path())).unwrap();
    assert_eq!(report.applied, vec!["ladder:0003_rust"]);
    assert!(service.find_domain("rust").is_some());

    std::fs::write(dir.path().join("0003_rust.toml"), "# edited\n").unwrap();
    let err = seed::run(&db, &service, Some(dir.path())).unwrap_err();
    assert!(err.to_string().contains("checksum"), "{err}");
}

#[test]
fn malformed_seed_documents_fail_loudly() {
    let (service, _, db, _) = setup();

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("0009_broken.toml"), "[[domains]]\nnam = \"typo\"\n").unwrap();

    let err = seed::run(&db, &service, Some(dir.path())).unwrap_err();
    assert_eq!(err.code(), "seed");
    assert!(db.applied_migrations().iter().all(|applied| applied.version != "0009_broken"));
}

#[test]
fn entry_tier_cannot_be_withdrawn() {
    let (service, ..) = setup();
    let id = three_tier_domain(&service);

    let withdraw_entry = ThresholdSpec { is_active: false, ..ThresholdSpec::new(1, 0, 49) };
    let err = service
        .publish_thresholds(
            &id,
            &[withdraw_entry, ThresholdSpec::new(2, 0, 79), ThresholdSpec::new(3, 80, 100)],
            None,
        )
        .unwrap_err();
    assert!(err.to_string().contains("entry tier cannot be withdrawn"), "{err}");
}
