use apex_database::{Database, DatabaseError, Migration};
use apex_domain::features::TierFeatures;
use apex_domain::ids::{AttemptId, CandidateId, DomainId, TierId};
use apex_domain::ladder::{Domain, Tier, TierLevel};
use apex_domain::performance::{Candidate, CandidateDomainPerformance, ExamAttempt};
use chrono::Utc;
use std::io::Write as _;

fn db() -> Database {
    Database::builder().namespace("test").init().expect("database should initialize")
}

fn domain(key: &str, name: &str) -> Domain {
    Domain {
        id: DomainId::new(format!("domain:{key}")),
        name: name.into(),
        description: String::new(),
        created_at: Utc::now(),
    }
}

fn tier(domain: &DomainId, level: u8) -> Tier {
    Tier {
        id: TierId::new(format!("tier:{}-{level}", domain.as_str())),
        domain_id: domain.clone(),
        level: TierLevel::new(level).expect("valid level"),
        name: format!("Tier {level}"),
        max_slots: (level > 1).then_some(2),
        yearly_cost: 0,
        features: TierFeatures::empty(),
    }
}

#[test]
fn builder_requires_namespace() {
    let err = Database::builder().init().expect_err("namespace is mandatory");
    assert_eq!(err.code(), "validation");
}

#[test]
fn domain_names_are_unique_case_insensitively() {
    let db = db();
    db.create_domain(domain("dsa", "DSA")).expect("first insert");

    let err = db.create_domain(domain("dsa2", "  dsa ")).expect_err("name clash");
    assert!(matches!(err, DatabaseError::Conflict { .. }));
    assert_eq!(db.find_domain("Dsa"), Some(DomainId::new("domain:dsa")));
}

#[test]
fn failed_transaction_leaves_partition_untouched() {
    let db = db();
    let dsa = domain("dsa", "DSA");
    let id = dsa.id.clone();
    db.create_domain(dsa).expect("create");

    let result: Result<(), DatabaseError> = db.transact(&id, |p| {
        p.insert_tier(tier(&id, 1))?;
        p.insert_tier(tier(&id, 1))
    });
    assert!(matches!(result, Err(DatabaseError::Conflict { .. })));

    let tiers = db.read(&id, |p| p.tiers().len()).expect("read");
    assert_eq!(tiers, 0, "staged insert must be discarded");
}

#[test]
fn tiers_are_kept_in_level_order() {
    let db = db();
    let dsa = domain("dsa", "DSA");
    let id = dsa.id.clone();
    db.create_domain(dsa).expect("create");

    db.transact(&id, |p| -> Result<(), DatabaseError> {
        p.insert_tier(tier(&id, 2))?;
        p.insert_tier(tier(&id, 1))?;
        p.insert_tier(tier(&id, 3))
    })
    .expect("insert tiers");

    let levels = db
        .read(&id, |p| p.tiers().iter().map(|t| t.level.get()).collect::<Vec<_>>())
        .expect("read");
    assert_eq!(levels, vec![1, 2, 3]);
}

#[test]
fn attempts_are_insert_only() {
    let db = db();
    let dsa = domain("dsa", "DSA");
    let id = dsa.id.clone();
    db.create_domain(dsa).expect("create");

    let attempt = ExamAttempt {
        attempt_id: AttemptId::new("attempt:1"),
        candidate_id: CandidateId::new("candidate:a"),
        domain_id: id.clone(),
        score: 70.0,
        participation_count: 1,
        submitted_at: Utc::now(),
        recorded_at: Utc::now(),
    };

    db.transact(&id, |p| p.record_attempt(attempt.clone())).expect("first attempt");
    let err = db.transact(&id, |p| p.record_attempt(attempt.clone())).expect_err("duplicate");
    assert!(matches!(err, DatabaseError::Conflict { .. }));
    assert_eq!(db.read(&id, |p| p.attempt_count()).expect("read"), 1);
}

#[test]
fn domain_with_enrolled_candidates_cannot_be_dropped() {
    let db = db();
    let dsa = domain("dsa", "DSA");
    let id = dsa.id.clone();
    db.create_domain(dsa).expect("create");

    let candidate = CandidateId::new("candidate:a");
    db.transact(&id, |p| -> Result<(), DatabaseError> {
        let entry = tier(&id, 1);
        let entry_id = entry.id.clone();
        p.insert_tier(entry)?;
        p.insert_performance(CandidateDomainPerformance::enroll(
            candidate.clone(),
            id.clone(),
            entry_id,
            Utc::now(),
        ))
    })
    .expect("enroll");

    let err = db.drop_domain(&id).expect_err("still referenced");
    assert!(matches!(err, DatabaseError::Constraint { .. }));

    db.transact(&id, |p| -> Result<(), DatabaseError> {
        p.remove_performance(&candidate);
        Ok(())
    })
    .expect("unenroll");

    let dropped = db.drop_domain(&id).expect("drop");
    assert_eq!(dropped.name, "DSA");
    assert!(matches!(db.read(&id, |_| ()), Err(DatabaseError::NotFound { .. })));
    assert!(db.find_domain("DSA").is_none());
}

#[test]
fn candidate_registry_rejects_duplicates() {
    let db = db();
    let candidate = Candidate {
        id: CandidateId::new("candidate:a"),
        display_name: "Ada".into(),
        registered_at: Utc::now(),
    };

    db.insert_candidate(candidate.clone()).expect("insert");
    assert!(db.insert_candidate(candidate.clone()).is_err());
    assert!(db.contains_candidate(&candidate.id));
    assert_eq!(db.remove_candidate(&candidate.id), Some(candidate));
    assert_eq!(db.candidate_count(), 0);
}

#[test]
fn withdrawing_candidate_is_hidden_until_removed() {
    let db = db();
    let candidate = Candidate {
        id: CandidateId::new("candidate:a"),
        display_name: "Ada".into(),
        registered_at: Utc::now(),
    };
    db.insert_candidate(candidate.clone()).expect("insert");

    assert_eq!(db.begin_withdrawal(&candidate.id), Some(candidate.clone()));
    assert!(!db.contains_candidate(&candidate.id));
    assert_eq!(db.candidate(&candidate.id), None);
    assert!(db.insert_candidate(candidate.clone()).is_err(), "the id is still taken");
    assert_eq!(db.begin_withdrawal(&candidate.id), Some(candidate.clone()), "resumable");

    assert_eq!(db.remove_candidate(&candidate.id), Some(candidate));
    assert_eq!(db.begin_withdrawal(&CandidateId::new("candidate:a")), None);
}

#[test]
fn failed_transaction_discards_staged_attempts() {
    let db = db();
    let dsa = domain("dsa", "DSA");
    let id = dsa.id.clone();
    db.create_domain(dsa).expect("create");
    let attempt = |n: u32, candidate: &str| ExamAttempt {
        attempt_id: AttemptId::new(format!("attempt:{n}")),
        candidate_id: CandidateId::new(candidate),
        domain_id: id.clone(),
        score: 60.0,
        participation_count: n,
        submitted_at: Utc::now(),
        recorded_at: Utc::now(),
    };

    db.transact(&id, |p| p.record_attempt(attempt(1, "candidate:a"))).expect("commit");
    let err = db
        .transact(&id, |p| -> Result<(), DatabaseError> {
            p.record_attempt(attempt(2, "candidate:a"))?;
            Err(DatabaseError::Validation { message: "rolled back".into(), context: None })
        })
        .expect_err("rollback");
    assert!(matches!(err, DatabaseError::Validation { .. }));

    let a = CandidateId::new("candidate:a");
    assert_eq!(db.read(&id, |p| p.attempts_of(&a).count()).expect("read"), 1);
    assert!(!db.read(&id, |p| p.has_attempt(&AttemptId::new("attempt:2"))).expect("read"));
}

#[test]
fn purged_attempts_keep_their_ids() {
    let db = db();
    let dsa = domain("dsa", "DSA");
    let id = dsa.id.clone();
    db.create_domain(dsa).expect("create");
    let a = CandidateId::new("candidate:a");
    let b = CandidateId::new("candidate:b");
    for (n, candidate) in [(1, &a), (2, &a), (3, &b)] {
        let attempt = ExamAttempt {
            attempt_id: AttemptId::new(format!("attempt:{n}")),
            candidate_id: candidate.clone(),
            domain_id: id.clone(),
            score: 60.0,
            participation_count: 1,
            submitted_at: Utc::now(),
            recorded_at: Utc::now(),
        };
        db.transact(&id, |p| p.record_attempt(attempt)).expect("record");
    }

    let removed = db
        .transact(&id, |p| -> Result<usize, DatabaseError> { Ok(p.remove_attempts_of(&a)) })
        .expect("purge");
    assert_eq!(removed, 2);

    assert_eq!(db.read(&id, |p| p.attempts_of(&a).count()).expect("read"), 0);
    assert_eq!(db.read(&id, |p| p.attempts_of(&b).count()).expect("read"), 1);
    assert_eq!(db.read(&id, |p| p.attempt_count()).expect("read"), 1);
    assert!(db.read(&id, |p| p.has_attempt(&AttemptId::new("attempt:1"))).expect("read"));
}

#[test]
fn migrations_apply_once_and_detect_edits() {
    let db = db();
    let first = vec![
        Migration::new("ladder", "0002_recalibrate", "b"),
        Migration::new("ladder", "0001_core", "a"),
    ];

    let mut seen = Vec::new();
    let report = db
        .migrations()
        .run(first.clone(), |m| -> Result<(), DatabaseError> {
            seen.push(m.version().to_owned());
            Ok(())
        })
        .expect("first run");
    assert_eq!(seen, vec!["0001_core", "0002_recalibrate"]);
    assert_eq!(report.applied.len(), 2);

    let report = db
        .migrations()
        .run(first, |_| -> Result<(), DatabaseError> { panic!("nothing left to apply") })
        .expect("second run");
    assert_eq!(report.skipped, vec!["ladder:0001_core", "ladder:0002_recalibrate"]);

    let edited = vec![Migration::new("ladder", "0001_core", "a, edited")];
    let err = db
        .migrations()
        .run(edited, |_| -> Result<(), DatabaseError> { Ok(()) })
        .expect_err("checksum changed");
    assert_eq!(err.code(), "migration");
    assert_eq!(db.applied_migrations().len(), 2);
}

#[test]
fn failed_migration_is_not_recorded() {
    let db = db();
    let result = db.migrations().run(vec![Migration::new("ladder", "0001", "x")], |_| {
        Err(DatabaseError::from("seed rejected"))
    });

    assert!(result.is_err());
    assert!(db.applied_migrations().is_empty());
}

#[test]
fn load_dir_reads_toml_files_in_version_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    for (name, body) in [("0002_b.toml", "b = 2"), ("0001_a.toml", "a = 1"), ("notes.md", "skip")] {
        let mut file = std::fs::File::create(dir.path().join(name)).expect("create");
        file.write_all(body.as_bytes()).expect("write");
    }

    let migrations = Migration::load_dir("ladder", dir.path()).expect("load");
    let versions: Vec<_> = migrations.iter().map(Migration::version).collect();
    assert_eq!(versions, vec!["0001_a", "0002_b"]);
    assert_eq!(migrations[0].checksum(), apex_database::checksum("a = 1"));
}
