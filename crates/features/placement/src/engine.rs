//! # Placement Engine
//!
//! Tier assignment over one staged [`DomainPartition`]. An [`Engine`] lives for exactly
//! one database transaction: the service opens it inside `Database::transact`, calls
//! one operation, and publishes [`Engine::into_changes`] only after the commit.
//!
//! ## Rules
//! * The target tier of an average is the highest rung whose minimum does not exceed it.
//! * A target below the current tier demotes the candidate into `COOLDOWN`.
//! * A target above the current tier, or the current tier for a waiting candidate, is an
//!   admission. A full tier admits only by displacing its lowest `ACTIVE` occupant, and
//!   only when the newcomer's average is strictly higher. Otherwise the candidate waits,
//!   keeping its current tier.
//! * A slot freed in a bounded tier goes to the best waiting candidate targeting it.
//! * Cooldowns expire lazily when an operation touches the candidate.
//!
//! Occupancy is always counted from the rows; nothing is cached.

use crate::error::PlacementError;
use crate::events::{PlacementChanged, PlacementReason};
use crate::policy::PlacementPolicy;
use apex_database::DomainPartition;
use apex_domain::ids::{CandidateId, TierId};
use apex_domain::ladder::TierLevel;
use apex_domain::performance::{CandidateDomainPerformance, CandidateStatus, ExamAttempt};
use apex_ladder::ActiveLadder;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// What a score did to the candidate who submitted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Unchanged,
    Promoted,
    /// Regained a slot in the tier it already belonged to.
    Rejoined,
    Demoted,
    Waitlisted,
    /// Still in cooldown; the score was recorded and nothing else moved.
    CooldownHold,
}

impl Movement {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Promoted => "promoted",
            Self::Rejoined => "rejoined",
            Self::Demoted => "demoted",
            Self::Waitlisted => "waitlisted",
            Self::CooldownHold => "cooldown_hold",
        }
    }
}

/// Result of one placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementOutcome {
    pub candidate_id: CandidateId,
    pub tier_id: TierId,
    pub tier_level: TierLevel,
    pub status: CandidateStatus,
    pub target_tier_id: Option<TierId>,
    pub average_score: f64,
    pub participation_count: u32,
    pub movement: Movement,
    /// Occupant pushed to the waiting list to make room.
    pub displaced: Option<CandidateId>,
    /// Waiting candidates seated in slots this placement freed.
    pub backfilled: Vec<CandidateId>,
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

pub(crate) struct Engine<'a> {
    partition: &'a mut DomainPartition,
    now: DateTime<Utc>,
    changes: Vec<PlacementChanged>,
}

impl<'a> Engine<'a> {
    pub(crate) const fn new(partition: &'a mut DomainPartition, now: DateTime<Utc>) -> Self {
        Self { partition, now, changes: Vec::new() }
    }

    pub(crate) fn into_changes(self) -> Vec<PlacementChanged> {
        self.changes
    }

    pub(crate) fn partition(&self) -> &DomainPartition {
        self.partition
    }

    // --- Placement ---

    /// Folds one scored attempt into the candidate's standing and re-places them.
    pub(crate) fn place(
        &mut self,
        ladder: &ActiveLadder,
        attempt: ExamAttempt,
        policy: &PlacementPolicy,
    ) -> Result<PlacementOutcome, PlacementError> {
        let candidate = attempt.candidate_id.clone();
        self.enrolled(&candidate)?;
        if self.partition.has_attempt(&attempt.attempt_id) {
            return Err(PlacementError::DuplicateAttempt {
                message: attempt.attempt_id.to_string().into(),
                context: Some(self.partition.domain().name.clone().into()),
            });
        }

        self.expire_cooldown(&candidate);

        let score = attempt.score;
        let now = self.now;
        let performance = self.performance_mut(&candidate)?;
        performance.record_score(score, now).map_err(PlacementError::invalid)?;
        let attempt =
            ExamAttempt { participation_count: performance.participation_count, ..attempt };
        self.partition.record_attempt(attempt)?;

        let performance = self.performance(&candidate)?;
        let status = performance.status;
        let average = performance.average_score;
        let in_cooldown = performance.is_in_cooldown_at(now);
        let current_level = self.level_of(&performance.current_tier_id)?;

        let (movement, displaced) = if in_cooldown {
            (Movement::CooldownHold, None)
        } else {
            let target = ladder.tier_for(average);
            let target_id = target.tier.id.clone();
            match target.tier.level.cmp(&current_level) {
                Ordering::Less => {
                    self.demote(&candidate, &target_id, policy);
                    (Movement::Demoted, None)
                },
                Ordering::Equal if status == CandidateStatus::Active => (Movement::Unchanged, None),
                _ => self.admit(&candidate, &target_id, average),
            }
        };

        self.outcome(&candidate, movement, displaced)
    }

    fn demote(&mut self, candidate: &CandidateId, tier: &TierId, policy: &PlacementPolicy) {
        let freed = self.active_tier_of(candidate);
        let now = self.now;
        let ends_at = now + policy.cooldown;

        self.transition(candidate, PlacementReason::Demoted, |p| {
            p.current_tier_id = tier.clone();
            p.status = CandidateStatus::Cooldown;
            p.target_tier_id = None;
            p.tier_assigned_date = now;
            p.cooldown_ends_at = Some(ends_at);
        });

        if let Some(freed) = freed {
            self.backfill(&freed);
        }
    }

    fn admit(
        &mut self,
        candidate: &CandidateId,
        tier: &TierId,
        average: f64,
    ) -> (Movement, Option<CandidateId>) {
        let freed = self.active_tier_of(candidate);
        let rejoining =
            self.partition.performance(candidate).is_some_and(|p| &p.current_tier_id == tier);
        let (reason, seated) = if rejoining {
            (PlacementReason::Rejoined, Movement::Rejoined)
        } else {
            (PlacementReason::Promoted, Movement::Promoted)
        };

        let result = if self.has_room(tier) {
            self.seat(candidate, tier, reason);
            (seated, None)
        } else if let Some(lowest) = self.lowest_occupant(tier).filter(|(_, low)| average > *low) {
            let lowest = lowest.0;
            self.transition(&lowest, PlacementReason::Displaced, |p| {
                p.status = CandidateStatus::WaitingList;
                p.target_tier_id = Some(tier.clone());
            });
            self.seat(candidate, tier, reason);
            (seated, Some(lowest))
        } else {
            self.transition(candidate, PlacementReason::Waitlisted, |p| {
                p.status = CandidateStatus::WaitingList;
                p.target_tier_id = Some(tier.clone());
            });
            (Movement::Waitlisted, None)
        };

        if let Some(freed) = freed.filter(|freed| freed != tier) {
            self.backfill(&freed);
        }
        result
    }

    /// Makes `candidate` an `ACTIVE` occupant of `tier`.
    fn seat(&mut self, candidate: &CandidateId, tier: &TierId, reason: PlacementReason) {
        let now = self.now;
        self.transition(candidate, reason, |p| {
            p.current_tier_id = tier.clone();
            p.status = CandidateStatus::Active;
            p.target_tier_id = None;
            p.tier_assigned_date = now;
            p.cooldown_ends_at = None;
        });
    }

    /// Fills free slots of `tier` from its waiting list, best average first.
    pub(crate) fn backfill(&mut self, tier: &TierId) -> Vec<CandidateId> {
        let mut seated = Vec::new();
        while self.has_room(tier) {
            let Some(next) = self.best_waiting(tier) else { break };
            self.seat(&next, tier, PlacementReason::Backfilled);
            seated.push(next);
        }
        seated
    }

    // --- Cooldown ---

    /// Ends an elapsed cooldown. The candidate rejoins its tier when a slot is free and
    /// waits for one otherwise. Returns whether the cooldown ended.
    pub(crate) fn expire_cooldown(&mut self, candidate: &CandidateId) -> bool {
        let Some(performance) = self.partition.performance(candidate) else { return false };
        if !performance.cooldown_elapsed_at(self.now) {
            return false;
        }

        let tier = performance.current_tier_id.clone();
        let now = self.now;
        let room = self.has_room(&tier);
        self.transition(candidate, PlacementReason::CooldownExpired, |p| {
            p.cooldown_ends_at = None;
            if room {
                p.status = CandidateStatus::Active;
                p.target_tier_id = None;
                p.tier_assigned_date = now;
            } else {
                p.status = CandidateStatus::WaitingList;
                p.target_tier_id = Some(tier.clone());
            }
        });
        true
    }

    /// Ends every elapsed cooldown in the domain, earliest expiry first.
    pub(crate) fn expire_cooldowns(&mut self) -> usize {
        let mut expired: Vec<_> = self
            .partition
            .performances()
            .filter(|p| p.cooldown_elapsed_at(self.now))
            .map(|p| (p.cooldown_ends_at, p.candidate_id.clone()))
            .collect();
        expired.sort();

        let mut count = 0;
        for (_, candidate) in expired {
            if self.expire_cooldown(&candidate) {
                count += 1;
            }
        }
        count
    }

    // --- Membership ---

    /// Enrolls in the entry tier or brings an `INACTIVE` candidate back.
    ///
    /// A returning candidate whose cooldown is still running goes back into cooldown;
    /// otherwise they rejoin their last tier the way an expired cooldown does.
    pub(crate) fn enroll(
        &mut self,
        candidate: &CandidateId,
        entry_tier: &TierId,
    ) -> Result<CandidateDomainPerformance, PlacementError> {
        match self.partition.performance(candidate).map(|p| p.status) {
            None => {
                let row = CandidateDomainPerformance::enroll(
                    candidate.clone(),
                    self.partition.domain().id.clone(),
                    entry_tier.clone(),
                    self.now,
                );
                self.partition.insert_performance(row.clone())?;
                self.changes.push(PlacementChanged {
                    domain_id: row.domain_id.clone(),
                    candidate_id: candidate.clone(),
                    reason: PlacementReason::Enrolled,
                    from_tier: None,
                    to_tier: Some(entry_tier.clone()),
                    status: Some(row.status),
                    at: self.now,
                });
                Ok(row)
            },
            Some(CandidateStatus::Inactive) => {
                let performance = self.performance(candidate)?;
                let now = self.now;
                let cooling = performance.cooldown_ends_at.is_some_and(|end| now < end);
                let tier = performance.current_tier_id.clone();
                let room = self.has_room(&tier);

                self.transition(candidate, PlacementReason::Enrolled, |p| {
                    if cooling {
                        p.status = CandidateStatus::Cooldown;
                    } else if room {
                        p.cooldown_ends_at = None;
                        p.status = CandidateStatus::Active;
                        p.tier_assigned_date = now;
                    } else {
                        p.cooldown_ends_at = None;
                        p.status = CandidateStatus::WaitingList;
                        p.target_tier_id = Some(tier.clone());
                    }
                });
                self.performance(candidate).cloned()
            },
            Some(_) => Err(PlacementError::AlreadyEnrolled {
                message: format!("{candidate} in {}", self.partition.domain().name).into(),
                context: None,
            }),
        }
    }

    /// Marks the candidate `INACTIVE`; its tier and scores are kept for a return.
    pub(crate) fn leave(
        &mut self,
        candidate: &CandidateId,
    ) -> Result<CandidateDomainPerformance, PlacementError> {
        self.enrolled(candidate)?;
        let freed = self.active_tier_of(candidate);

        self.transition(candidate, PlacementReason::Left, |p| {
            p.status = CandidateStatus::Inactive;
            p.target_tier_id = None;
        });
        if let Some(freed) = freed {
            self.backfill(&freed);
        }
        self.performance(candidate).cloned()
    }

    /// Deletes the candidate's row and attempts. Returns `false` when there was no row.
    pub(crate) fn withdraw(&mut self, candidate: &CandidateId) -> bool {
        let freed = self.active_tier_of(candidate);
        self.partition.remove_attempts_of(candidate);
        let Some(row) = self.partition.remove_performance(candidate) else { return false };

        self.changes.push(PlacementChanged {
            domain_id: row.domain_id,
            candidate_id: row.candidate_id,
            reason: PlacementReason::Withdrawn,
            from_tier: Some(row.current_tier_id),
            to_tier: None,
            status: None,
            at: self.now,
        });
        if let Some(freed) = freed {
            self.backfill(&freed);
        }
        true
    }

    // --- Capacity ---

    /// Changes a tier's capacity and seats waiting candidates in any new slots.
    pub(crate) fn resize(
        &mut self,
        tier: &TierId,
        max_slots: Option<u32>,
    ) -> Result<Vec<CandidateId>, PlacementError> {
        let occupancy = self.partition.active_count(tier);
        if let Some(slots) = max_slots
            && occupancy > slots as usize
        {
            return Err(PlacementError::CapacityBelowOccupancy {
                message: format!("{tier} has {occupancy} active occupants, requested {slots} slots")
                    .into(),
                context: None,
            });
        }

        self.partition.set_tier_capacity(tier, max_slots)?;
        Ok(self.backfill(tier))
    }

    // --- Queries ---

    fn has_room(&self, tier: &TierId) -> bool {
        self.partition
            .tier(tier)
            .is_some_and(|t| t.has_room_for(self.partition.active_count(tier)))
    }

    fn active_tier_of(&self, candidate: &CandidateId) -> Option<TierId> {
        self.partition
            .performance(candidate)
            .filter(|p| p.status.occupies_slot())
            .map(|p| p.current_tier_id.clone())
    }

    /// Lowest average among `ACTIVE` occupants; ties go to the most recently assigned,
    /// then to the smallest candidate id.
    fn lowest_occupant(&self, tier: &TierId) -> Option<(CandidateId, f64)> {
        self.partition
            .performances()
            .filter(|p| p.status.occupies_slot() && &p.current_tier_id == tier)
            .min_by(|a, b| {
                a.average_score
                    .total_cmp(&b.average_score)
                    .then_with(|| b.tier_assigned_date.cmp(&a.tier_assigned_date))
                    .then_with(|| a.candidate_id.cmp(&b.candidate_id))
            })
            .map(|p| (p.candidate_id.clone(), p.average_score))
    }

    /// Highest average waiting for `tier`; ties go to the smallest candidate id.
    fn best_waiting(&self, tier: &TierId) -> Option<CandidateId> {
        self.partition
            .performances()
            .filter(|p| {
                p.status == CandidateStatus::WaitingList && p.target_tier_id.as_ref() == Some(tier)
            })
            .max_by(|a, b| {
                a.average_score
                    .total_cmp(&b.average_score)
                    .then_with(|| b.candidate_id.cmp(&a.candidate_id))
            })
            .map(|p| p.candidate_id.clone())
    }

    fn level_of(&self, tier: &TierId) -> Result<TierLevel, PlacementError> {
        self.partition.tier(tier).map(|t| t.level).ok_or_else(|| PlacementError::Internal {
            message: format!("performance row references missing tier {tier}").into(),
            context: Some(self.partition.domain().name.clone().into()),
        })
    }

    /// The candidate's row, provided they are enrolled and not `INACTIVE`.
    fn enrolled(&self, candidate: &CandidateId) -> Result<(), PlacementError> {
        match self.partition.performance(candidate) {
            Some(p) if p.status != CandidateStatus::Inactive => Ok(()),
            Some(_) => Err(PlacementError::candidate_not_found(format!(
                "{candidate} is inactive in {}",
                self.partition.domain().name
            ))),
            None => Err(PlacementError::candidate_not_found(format!(
                "{candidate} is not enrolled in {}",
                self.partition.domain().name
            ))),
        }
    }

    fn performance(
        &self,
        candidate: &CandidateId,
    ) -> Result<&CandidateDomainPerformance, PlacementError> {
        self.partition.performance(candidate).ok_or_else(|| {
            PlacementError::candidate_not_found(candidate.to_string())
        })
    }

    fn performance_mut(
        &mut self,
        candidate: &CandidateId,
    ) -> Result<&mut CandidateDomainPerformance, PlacementError> {
        self.partition.performance_mut(candidate).ok_or_else(|| {
            PlacementError::candidate_not_found(candidate.to_string())
        })
    }

    /// Applies `update` and records a change event when tier, status or target moved.
    fn transition(
        &mut self,
        candidate: &CandidateId,
        reason: PlacementReason,
        update: impl FnOnce(&mut CandidateDomainPerformance),
    ) {
        let Some(performance) = self.partition.performance_mut(candidate) else { return };
        let from_tier = performance.current_tier_id.clone();
        let before = (performance.status, performance.target_tier_id.clone());

        update(performance);

        if from_tier == performance.current_tier_id
            && before == (performance.status, performance.target_tier_id.clone())
        {
            return;
        }
        let event = PlacementChanged {
            domain_id: performance.domain_id.clone(),
            candidate_id: candidate.clone(),
            reason,
            from_tier: Some(from_tier),
            to_tier: Some(performance.current_tier_id.clone()),
            status: Some(performance.status),
            at: self.now,
        };
        self.changes.push(event);
    }

    fn outcome(
        &self,
        candidate: &CandidateId,
        movement: Movement,
        displaced: Option<CandidateId>,
    ) -> Result<PlacementOutcome, PlacementError> {
        let performance = self.performance(candidate)?;
        let backfilled = self
            .changes
            .iter()
            .filter(|change| {
                change.reason == PlacementReason::Backfilled && &change.candidate_id != candidate
            })
            .map(|change| change.candidate_id.clone())
            .collect();

        Ok(PlacementOutcome {
            candidate_id: candidate.clone(),
            tier_id: performance.current_tier_id.clone(),
            tier_level: self.level_of(&performance.current_tier_id)?,
            status: performance.status,
            target_tier_id: performance.target_tier_id.clone(),
            average_score: performance.average_score,
            participation_count: performance.participation_count,
            movement,
            displaced,
            backfilled,
            cooldown_ends_at: performance.cooldown_ends_at,
        })
    }
}
