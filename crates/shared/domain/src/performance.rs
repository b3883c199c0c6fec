//! Candidates, their per-domain standing and the scored attempts feeding it.

use crate::ids::{AttemptId, CandidateId, DomainId, TierId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub display_name: String,
    pub registered_at: DateTime<Utc>,
}

/// Placement status within one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateStatus {
    /// Holds a slot in `current_tier_id`.
    Active,
    /// Qualifies for `target_tier_id` but no slot is free; keeps `current_tier_id`.
    WaitingList,
    /// Left the domain; keeps the last tier for when they come back.
    Inactive,
    /// Recently demoted; cannot move until `cooldown_ends_at`.
    Cooldown,
}

impl CandidateStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::WaitingList => "WAITING_LIST",
            Self::Inactive => "INACTIVE",
            Self::Cooldown => "COOLDOWN",
        }
    }

    /// Only active candidates count against a tier's capacity.
    #[must_use]
    pub const fn occupies_slot(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate's standing in one domain.
///
/// `average_score` is always `total_score / participation_count` (or `0` before the
/// first attempt).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDomainPerformance {
    pub candidate_id: CandidateId,
    pub domain_id: DomainId,
    pub current_tier_id: TierId,
    pub target_tier_id: Option<TierId>,
    pub total_score: f64,
    pub average_score: f64,
    pub participation_count: u32,
    pub status: CandidateStatus,
    pub enrolled_at: DateTime<Utc>,
    pub last_active: Option<DateTime<Utc>>,
    pub tier_assigned_date: DateTime<Utc>,
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

impl CandidateDomainPerformance {
    /// Fresh enrollment: active in the entry tier with no attempts.
    #[must_use]
    pub fn enroll(
        candidate_id: CandidateId,
        domain_id: DomainId,
        entry_tier: TierId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            candidate_id,
            domain_id,
            current_tier_id: entry_tier,
            target_tier_id: None,
            total_score: 0.0,
            average_score: 0.0,
            participation_count: 0,
            status: CandidateStatus::Active,
            enrolled_at: now,
            last_active: None,
            tier_assigned_date: now,
            cooldown_ends_at: None,
        }
    }

    /// Folds one score into the running aggregates.
    ///
    /// # Errors
    /// Leaves the row untouched and returns a message once the participation count
    /// cannot grow any further.
    pub fn record_score(&mut self, score: f64, at: DateTime<Utc>) -> Result<(), String> {
        let count = self.participation_count.checked_add(1).ok_or_else(|| {
            format!("{} has no attempts left in {}", self.candidate_id, self.domain_id)
        })?;
        self.total_score += score;
        self.participation_count = count;
        self.average_score = self.total_score / f64::from(count);
        self.last_active = Some(at);
        Ok(())
    }

    #[must_use]
    pub fn is_in_cooldown_at(&self, at: DateTime<Utc>) -> bool {
        self.status == CandidateStatus::Cooldown
            && self.cooldown_ends_at.is_some_and(|end| at < end)
    }

    /// Still marked `COOLDOWN` although the period is over at `at`.
    #[must_use]
    pub fn cooldown_elapsed_at(&self, at: DateTime<Utc>) -> bool {
        self.status == CandidateStatus::Cooldown && !self.is_in_cooldown_at(at)
    }

    /// Whether recruiters see the row under `tier`. Waiting candidates stay listed
    /// under the tier they hold until they are seated elsewhere.
    #[must_use]
    pub fn is_listed_in(&self, tier: &TierId) -> bool {
        &self.current_tier_id == tier
            && matches!(self.status, CandidateStatus::Active | CandidateStatus::WaitingList)
    }
}

/// Immutable record of one scored exam attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamAttempt {
    pub attempt_id: AttemptId,
    pub candidate_id: CandidateId,
    pub domain_id: DomainId,
    pub score: f64,
    /// The candidate's participation count once this attempt is counted.
    pub participation_count: u32,
    pub submitted_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

/// Inbound "exam scored" event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    pub attempt_id: AttemptId,
    pub candidate_id: CandidateId,
    pub domain_id: DomainId,
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}
