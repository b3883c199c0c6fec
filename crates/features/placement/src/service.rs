use crate::anonymize::Anonymizer;
use crate::engine::{Engine, PlacementOutcome};
use crate::error::PlacementError;
use crate::events::{PlacementChanged, PlacementReason};
use crate::policy::PlacementPolicy;
use crate::standings::{CandidateDomainStatus, RankedCandidate, rank};
use apex_database::{Database, DatabaseError, DomainPartition};
use apex_domain::constants::{MAX_SCORE, MIN_SCORE};
use apex_domain::ids::{CandidateId, DomainId, TierId};
use apex_domain::ladder::Tier;
use apex_domain::performance::{
    Candidate, CandidateDomainPerformance, CandidateStatus, ExamAttempt, ScoreEvent,
};
use apex_event_bus::EventBus;
use apex_kernel::clock::SharedClock;
use apex_kernel::new_id;
use apex_ladder::ActiveLadder;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};

const MAX_DISPLAY_NAME_LEN: usize = 64;

/// What [`PlacementService::withdraw`] removed.
#[derive(Debug, Clone, PartialEq)]
pub struct Withdrawal {
    pub candidate: Candidate,
    /// Domains that held a performance row for the candidate.
    pub domains: Vec<DomainId>,
    /// Waiting candidates seated in the slots the withdrawal freed.
    pub backfilled: Vec<CandidateId>,
}

/// A tier after a capacity change.
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityChange {
    pub tier: Tier,
    pub backfilled: Vec<CandidateId>,
}

/// Candidate registry, enrollment and score placement.
#[derive(Debug, Clone)]
pub struct PlacementService {
    db: Database,
    events: EventBus,
    clock: SharedClock,
    policy: PlacementPolicy,
    anonymizer: Anonymizer,
}

impl PlacementService {
    #[must_use]
    pub const fn new(
        db: Database,
        events: EventBus,
        clock: SharedClock,
        policy: PlacementPolicy,
        anonymizer: Anonymizer,
    ) -> Self {
        Self { db, events, clock, policy, anonymizer }
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    #[must_use]
    pub const fn policy(&self) -> &PlacementPolicy {
        &self.policy
    }

    #[must_use]
    pub const fn anonymizer(&self) -> &Anonymizer {
        &self.anonymizer
    }

    // --- Candidates ---

    /// # Errors
    /// [`PlacementError::InvalidRequest`] for a blank or oversized display name.
    #[instrument(skip_all)]
    pub fn register_candidate(&self, display_name: &str) -> Result<Candidate, PlacementError> {
        let display_name = display_name.trim();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(PlacementError::invalid(format!(
                "display name must be 1 to {MAX_DISPLAY_NAME_LEN} characters"
            )));
        }

        let candidate = Candidate {
            id: new_id(),
            display_name: display_name.to_owned(),
            registered_at: self.now(),
        };
        self.db.insert_candidate(candidate.clone())?;
        info!(candidate = %candidate.id, "Candidate registered");
        Ok(candidate)
    }

    /// # Errors
    /// [`PlacementError::CandidateNotFound`] for an unknown id.
    pub fn candidate(&self, id: &CandidateId) -> Result<Candidate, PlacementError> {
        self.db
            .candidate(id)
            .ok_or_else(|| PlacementError::candidate_not_found(format!("{id} is not registered")))
    }

    /// Every domain the candidate holds a row in, `INACTIVE` ones included, by domain id.
    ///
    /// # Errors
    /// [`PlacementError::CandidateNotFound`] for an unknown id.
    pub fn enrollments(
        &self,
        id: &CandidateId,
    ) -> Result<Vec<CandidateDomainPerformance>, PlacementError> {
        self.candidate(id)?;

        let mut rows = Vec::new();
        for domain in self.db.domain_ids() {
            match self.db.read(&domain, |partition| partition.performance(id).cloned()) {
                Ok(Some(row)) => rows.push(row),
                Ok(None) | Err(DatabaseError::NotFound { .. }) => {},
                Err(err) => return Err(err.into()),
            }
        }
        rows.sort_by(|a, b| a.domain_id.cmp(&b.domain_id));
        Ok(rows)
    }

    /// Selects a skill domain: the candidate starts `ACTIVE` in the entry tier. A
    /// candidate who left the domain comes back to their last tier instead.
    ///
    /// # Errors
    /// [`PlacementError::CandidateNotFound`] for an unregistered candidate,
    /// [`PlacementError::IncompleteLadder`] while the domain has no valid ladder,
    /// [`PlacementError::AlreadyEnrolled`] when a live row exists.
    #[instrument(skip(self))]
    pub fn enroll(
        &self,
        candidate: &CandidateId,
        domain: &DomainId,
    ) -> Result<CandidateDomainPerformance, PlacementError> {
        let now = self.now();

        let (row, changes) = self
            .db
            .transact(domain, |partition| -> Result<_, PlacementError> {
                if !self.db.contains_candidate(candidate) {
                    return Err(PlacementError::candidate_not_found(format!(
                        "{candidate} is not registered"
                    )));
                }
                let ladder = resolve(partition, now)?;
                let entry = ladder.entry().tier.id.clone();

                let mut engine = Engine::new(partition, now);
                let row = engine.enroll(candidate, &entry)?;
                Ok((row, engine.into_changes()))
            })
            .map_err(PlacementError::normalize)?;

        info!(tier = %row.current_tier_id, status = %row.status, "Candidate enrolled");
        self.notify(changes);
        Ok(row)
    }

    /// Marks the candidate `INACTIVE` in one domain and frees their slot.
    ///
    /// # Errors
    /// [`PlacementError::CandidateNotFound`] when not enrolled or already inactive.
    #[instrument(skip(self))]
    pub fn leave_domain(
        &self,
        candidate: &CandidateId,
        domain: &DomainId,
    ) -> Result<CandidateDomainPerformance, PlacementError> {
        let now = self.now();
        let (row, changes) = self
            .db
            .transact(domain, |partition| -> Result<_, PlacementError> {
                let mut engine = Engine::new(partition, now);
                let row = engine.leave(candidate)?;
                Ok((row, engine.into_changes()))
            })
            .map_err(PlacementError::normalize)?;

        info!("Candidate left domain");
        self.notify(changes);
        Ok(row)
    }

    /// Deregisters a candidate and deletes their rows and attempts in every domain,
    /// backfilling the slots they held. Tiers and thresholds are never touched.
    ///
    /// The candidate is marked as withdrawing first, so no domain can enroll or place
    /// them while the domains are visited. Each domain commits on its own; a failure
    /// part-way leaves the mark and the remaining rows in place, and repeating the call
    /// finishes the job.
    ///
    /// # Errors
    /// [`PlacementError::CandidateNotFound`] for an unknown id.
    #[instrument(skip(self))]
    pub fn withdraw(&self, candidate: &CandidateId) -> Result<Withdrawal, PlacementError> {
        if self.db.begin_withdrawal(candidate).is_none() {
            return Err(PlacementError::candidate_not_found(format!(
                "{candidate} is not registered"
            )));
        }
        let now = self.now();

        let mut domains = Vec::new();
        let mut backfilled = Vec::new();
        for domain in self.db.domain_ids() {
            let result = self.db.transact(&domain, |partition| -> Result<_, PlacementError> {
                let mut engine = Engine::new(partition, now);
                let removed = engine.withdraw(candidate);
                Ok((removed, engine.into_changes()))
            });
            let (removed, changes) = match result {
                Ok(done) => done,
                Err(PlacementError::Database { source: DatabaseError::NotFound { .. }, .. }) => {
                    continue;
                },
                Err(err) => return Err(err),
            };

            if removed {
                domains.push(domain);
            }
            backfilled.extend(
                changes
                    .iter()
                    .filter(|change| change.reason == PlacementReason::Backfilled)
                    .map(|change| change.candidate_id.clone()),
            );
            self.notify(changes);
        }

        let candidate = self.db.remove_candidate(candidate).ok_or_else(|| {
            PlacementError::candidate_not_found(format!("{candidate} was removed concurrently"))
        })?;
        domains.sort();
        info!(domains = domains.len(), backfilled = backfilled.len(), "Candidate withdrawn");
        Ok(Withdrawal { candidate, domains, backfilled })
    }

    // --- Placement ---

    /// Folds one graded attempt into the candidate's standing and re-places them.
    ///
    /// Checks run in order: score range, domain, ladder, enrollment, attempt id. Any
    /// failure leaves the domain untouched.
    ///
    /// # Errors
    /// [`PlacementError::InvalidScore`], [`PlacementError::DomainNotFound`],
    /// [`PlacementError::IncompleteLadder`], [`PlacementError::CandidateNotFound`] or
    /// [`PlacementError::DuplicateAttempt`].
    #[instrument(
        skip(self, event),
        fields(
            domain = %event.domain_id,
            candidate = %event.candidate_id,
            attempt = %event.attempt_id
        )
    )]
    pub fn place_candidate(&self, event: ScoreEvent) -> Result<PlacementOutcome, PlacementError> {
        validate_score(event.score)?;
        let now = self.now();
        let domain = event.domain_id.clone();
        let attempt = ExamAttempt {
            attempt_id: event.attempt_id,
            candidate_id: event.candidate_id,
            domain_id: event.domain_id,
            score: event.score,
            participation_count: 0,
            submitted_at: event.timestamp,
            recorded_at: now,
        };

        let (outcome, changes) = self
            .db
            .transact(&domain, |partition| -> Result<_, PlacementError> {
                let ladder = resolve(partition, now)?;
                if !self.db.contains_candidate(&attempt.candidate_id) {
                    return Err(not_enrolled(partition, &attempt.candidate_id));
                }
                let mut engine = Engine::new(partition, now);
                let outcome = engine.place(&ladder, attempt, &self.policy)?;
                Ok((outcome, engine.into_changes()))
            })
            .map_err(PlacementError::normalize)?;

        info!(
            tier = %outcome.tier_id,
            status = %outcome.status,
            movement = outcome.movement.as_str(),
            average = outcome.average_score,
            "Candidate placed"
        );
        self.notify(changes);
        Ok(outcome)
    }

    // --- Queries ---

    /// The candidate's tier, status and progress towards the next tier.
    ///
    /// # Errors
    /// [`PlacementError::CandidateNotFound`] when the candidate has no row in the domain.
    pub fn candidate_status(
        &self,
        candidate: &CandidateId,
        domain: &DomainId,
    ) -> Result<CandidateDomainStatus, PlacementError> {
        let now = self.now();
        let settled = self
            .db
            .read(domain, |partition| match partition.performance(candidate) {
                Some(row) if row.cooldown_elapsed_at(now) => None,
                _ => Some(domain_status(partition, candidate, now)),
            })
            .map_err(|err| PlacementError::from(err).normalize())?;
        if let Some(status) = settled {
            return status;
        }

        let (status, changes) = self
            .db
            .transact(domain, |partition| -> Result<_, PlacementError> {
                let mut engine = Engine::new(partition, now);
                engine.expire_cooldown(candidate);

                let status = domain_status(engine.partition(), candidate, now)?;
                Ok((status, engine.into_changes()))
            })
            .map_err(PlacementError::normalize)?;

        self.notify(changes);
        Ok(status)
    }

    /// Candidates assigned to a tier, ranked and anonymized: its `ACTIVE` occupants and
    /// the waiting candidates who still hold it as their current tier.
    ///
    /// # Errors
    /// [`PlacementError::TierNotFound`] when the tier is not part of the domain.
    pub fn tier_occupants(
        &self,
        domain: &DomainId,
        tier: &TierId,
    ) -> Result<Vec<RankedCandidate>, PlacementError> {
        self.listing(domain, tier, |row| row.is_listed_in(tier))
    }

    /// Candidates waiting for a slot in a tier, ranked and anonymized.
    ///
    /// # Errors
    /// [`PlacementError::TierNotFound`] when the tier is not part of the domain.
    pub fn waiting_list(
        &self,
        domain: &DomainId,
        tier: &TierId,
    ) -> Result<Vec<RankedCandidate>, PlacementError> {
        self.listing(domain, tier, |row| {
            row.status == CandidateStatus::WaitingList && row.target_tier_id.as_ref() == Some(tier)
        })
    }

    /// Recorded attempts of one candidate in one domain, oldest first.
    ///
    /// # Errors
    /// [`PlacementError::CandidateNotFound`] when the candidate has no row in the domain.
    pub fn attempts(
        &self,
        candidate: &CandidateId,
        domain: &DomainId,
    ) -> Result<Vec<ExamAttempt>, PlacementError> {
        self.db
            .read(domain, |partition| -> Result<Vec<ExamAttempt>, PlacementError> {
                if partition.performance(candidate).is_none() {
                    return Err(not_enrolled(partition, candidate));
                }
                Ok(partition.attempts_of(candidate).cloned().collect())
            })
            .map_err(|err| PlacementError::from(err).normalize())?
    }

    // --- Capacity ---

    /// Changes a bounded tier's slot count. New slots go to the waiting list at once;
    /// shrinking below the current number of `ACTIVE` occupants is refused.
    ///
    /// # Errors
    /// [`PlacementError::InvalidRequest`] for zero slots or a bounded entry tier,
    /// [`PlacementError::TierNotFound`], [`PlacementError::CapacityBelowOccupancy`].
    #[instrument(skip(self))]
    pub fn resize_tier(
        &self,
        domain: &DomainId,
        tier: &TierId,
        max_slots: Option<u32>,
    ) -> Result<CapacityChange, PlacementError> {
        if max_slots == Some(0) {
            return Err(PlacementError::invalid("a bounded tier needs at least one slot"));
        }
        let now = self.now();

        let (change, changes) = self
            .db
            .transact(domain, |partition| -> Result<_, PlacementError> {
                let level = known_tier(partition, tier)?.level;
                if level.is_entry() && max_slots.is_some() {
                    return Err(PlacementError::invalid("the entry tier is always unbounded"));
                }

                let mut engine = Engine::new(partition, now);
                engine.expire_cooldowns();
                let backfilled = engine.resize(tier, max_slots)?;
                let tier = known_tier(engine.partition(), tier)?.clone();
                Ok((CapacityChange { tier, backfilled }, engine.into_changes()))
            })
            .map_err(PlacementError::normalize)?;

        info!(backfilled = change.backfilled.len(), "Tier capacity changed");
        self.notify(changes);
        Ok(change)
    }

    fn listing(
        &self,
        domain: &DomainId,
        tier: &TierId,
        include: impl Fn(&CandidateDomainPerformance) -> bool,
    ) -> Result<Vec<RankedCandidate>, PlacementError> {
        let now = self.now();
        let settled = self
            .db
            .read(domain, |partition| -> Result<_, PlacementError> {
                known_tier(partition, tier)?;
                if partition.performances().any(|row| row.cooldown_elapsed_at(now)) {
                    return Ok(None);
                }
                let rows = partition.performances().filter(|row| include(row));
                Ok(Some(rank(rows, &self.anonymizer)))
            })
            .map_err(|err| PlacementError::from(err).normalize())??;
        if let Some(listing) = settled {
            return Ok(listing);
        }

        let (listing, changes) = self
            .db
            .transact(domain, |partition| -> Result<_, PlacementError> {
                known_tier(partition, tier)?;
                let mut engine = Engine::new(partition, now);
                let expired = engine.expire_cooldowns();
                if expired > 0 {
                    debug!(expired, "Cooldowns expired on read");
                }

                let rows = engine.partition().performances().filter(|row| include(row));
                let listing = rank(rows, &self.anonymizer);
                Ok((listing, engine.into_changes()))
            })
            .map_err(PlacementError::normalize)?;

        self.notify(changes);
        Ok(listing)
    }

    fn notify(&self, changes: Vec<PlacementChanged>) {
        for change in changes {
            if let Err(err) = self.events.publish(change) {
                warn!(error = %err, "Failed to publish placement event");
            }
        }
    }
}

fn validate_score(score: f64) -> Result<(), PlacementError> {
    let range = f64::from(MIN_SCORE)..=f64::from(MAX_SCORE);
    if score.is_finite() && range.contains(&score) {
        return Ok(());
    }
    Err(PlacementError::InvalidScore {
        message: format!("{score} is outside [{MIN_SCORE}, {MAX_SCORE}]").into(),
        context: None,
    })
}

fn resolve(partition: &DomainPartition, at: DateTime<Utc>) -> Result<ActiveLadder, PlacementError> {
    ActiveLadder::resolve(partition, at)
        .map_err(|err| PlacementError::incomplete(err, &partition.domain().name))
}

fn known_tier<'a>(
    partition: &'a DomainPartition,
    tier: &TierId,
) -> Result<&'a Tier, PlacementError> {
    partition.tier(tier).ok_or_else(|| PlacementError::TierNotFound {
        message: format!("{tier} is not a tier of {}", partition.domain().name).into(),
        context: None,
    })
}

fn not_enrolled(partition: &DomainPartition, candidate: &CandidateId) -> PlacementError {
    PlacementError::candidate_not_found(format!(
        "{candidate} is not enrolled in {}",
        partition.domain().name
    ))
}

fn domain_status(
    partition: &DomainPartition,
    candidate: &CandidateId,
    now: DateTime<Utc>,
) -> Result<CandidateDomainStatus, PlacementError> {
    let row = partition.performance(candidate).ok_or_else(|| not_enrolled(partition, candidate))?;
    let tier = partition.tier(&row.current_tier_id).ok_or_else(|| PlacementError::Internal {
        message: format!("performance row references missing tier {}", row.current_tier_id).into(),
        context: Some(partition.domain().name.clone().into()),
    })?;

    // An incomplete ladder still lets candidates see where they stand.
    let ladder = ActiveLadder::resolve(partition, now).ok();
    let progress =
        ladder.as_ref().and_then(|ladder| ladder.progress_to_next(&tier.id, row.average_score));
    let next_tier_id = ladder
        .as_ref()
        .and_then(|ladder| ladder.rung_above(&tier.id))
        .map(|rung| rung.tier.id.clone());

    Ok(CandidateDomainStatus {
        candidate_id: row.candidate_id.clone(),
        domain_id: row.domain_id.clone(),
        tier_id: tier.id.clone(),
        tier_level: tier.level,
        tier_name: tier.name.clone(),
        status: row.status,
        target_tier_id: row.target_tier_id.clone(),
        average_score: row.average_score,
        participation_count: row.participation_count,
        progress_to_next_tier: progress,
        next_tier_id,
        cooldown_ends_at: row.cooldown_ends_at,
        last_active: row.last_active,
        tier_assigned_date: row.tier_assigned_date,
    })
}
