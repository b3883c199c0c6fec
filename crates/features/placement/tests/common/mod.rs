#![allow(dead_code)]

use apex_database::Database;
use apex_domain::ids::{AttemptId, CandidateId, DomainId, TierId};
use apex_domain::ladder::TierLevel;
use apex_domain::performance::ScoreEvent;
use apex_event_bus::EventBus;
use apex_kernel::clock::ManualClock;
use apex_ladder::{LadderService, ThresholdSpec, TierSpec, tier_id};
use apex_placement::{
    Anonymizer, PlacementError, PlacementOutcome, PlacementPolicy, PlacementService,
};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::atomic::{AtomicU32, Ordering};

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 12, 0, 0).unwrap()
}

pub struct Harness {
    pub db: Database,
    pub events: EventBus,
    pub clock: ManualClock,
    pub ladder: LadderService,
    pub placement: PlacementService,
    attempts: AtomicU32,
}

impl Harness {
    pub fn new() -> Self {
        let db = Database::builder().namespace("placement-test").init().unwrap();
        let events = EventBus::new();
        let clock = ManualClock::new(start());
        let ladder = LadderService::new(db.clone(), events.clone(), clock.shared());
        let placement = PlacementService::new(
            db.clone(),
            events.clone(),
            clock.shared(),
            PlacementPolicy::default(),
            Anonymizer::new("test-salt"),
        );
        Self { db, events, clock, ladder, placement, attempts: AtomicU32::new(0) }
    }

    /// DSA ladder `[0, 39] [40, 59] [60, 79] [80, 100]` with 2, 1 and 1 slots above the
    /// entry tier.
    pub fn dsa(&self) -> DomainId {
        self.domain(
            "DSA",
            &[None, Some(2), Some(1), Some(1)],
            &[(0, 39), (40, 59), (60, 79), (80, 100)],
        )
    }

    pub fn domain(&self, name: &str, slots: &[Option<u32>], ranges: &[(u8, u8)]) -> DomainId {
        let domain = self.ladder.create_domain(name, "").unwrap();
        for (level, max_slots) in (1u8..).zip(slots) {
            let spec = TierSpec {
                level,
                name: format!("{name} {level}"),
                max_slots: *max_slots,
                yearly_cost: 0,
                features: Vec::new(),
            };
            self.ladder.add_tier(&domain.id, spec).unwrap();
        }
        let specs: Vec<_> = (1u8..)
            .zip(ranges)
            .map(|(level, &(min, max))| ThresholdSpec::new(level, min, max))
            .collect();
        self.ladder.publish_thresholds(&domain.id, &specs, None).unwrap();
        domain.id
    }

    /// Registers and enrolls a fresh candidate.
    pub fn candidate(&self, name: &str, domain: &DomainId) -> CandidateId {
        let candidate = self.placement.register_candidate(name).unwrap();
        self.placement.enroll(&candidate.id, domain).unwrap();
        candidate.id
    }

    pub fn next_attempt(&self) -> AttemptId {
        let n = self.attempts.fetch_add(1, Ordering::Relaxed);
        AttemptId::new(format!("attempt:{n}"))
    }

    pub fn try_score(
        &self,
        domain: &DomainId,
        candidate: &CandidateId,
        score: f64,
    ) -> Result<PlacementOutcome, PlacementError> {
        self.placement.place_candidate(ScoreEvent {
            attempt_id: self.next_attempt(),
            candidate_id: candidate.clone(),
            domain_id: domain.clone(),
            score,
            timestamp: self.clock_now(),
        })
    }

    pub fn score(
        &self,
        domain: &DomainId,
        candidate: &CandidateId,
        score: f64,
    ) -> PlacementOutcome {
        self.try_score(domain, candidate, score).unwrap()
    }

    pub fn clock_now(&self) -> DateTime<Utc> {
        self.placement.now()
    }
}

pub fn tier(domain: &DomainId, level: u8) -> TierId {
    tier_id(domain, TierLevel::new(level).unwrap())
}
