use crate::engine::PlacementOutcome;
use crate::service::{CapacityChange, Withdrawal};
use crate::standings::{CandidateDomainStatus, RankedCandidate};
use apex_derive::api_model;
use apex_domain::ids::{CandidateId, DomainId, TierId};
use apex_domain::performance::{Candidate, CandidateDomainPerformance, ExamAttempt};
use chrono::{DateTime, Utc};

fn ids(ids: Vec<CandidateId>) -> Vec<String> {
    ids.into_iter().map(CandidateId::into_inner).collect()
}

#[api_model]
/// New candidate
pub struct RegisterCandidateRequest {
    pub display_name: String,
}

#[api_model]
pub struct CandidateResponse {
    pub id: String,
    pub display_name: String,
    pub registered_at: DateTime<Utc>,
}

impl From<Candidate> for CandidateResponse {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into_inner(),
            display_name: candidate.display_name,
            registered_at: candidate.registered_at,
        }
    }
}

#[api_model]
/// Candidate with one entry per domain they hold a row in
pub struct CandidateDetailsResponse {
    pub candidate: CandidateResponse,
    pub enrollments: Vec<EnrollmentResponse>,
}

#[api_model]
pub struct EnrollRequest {
    /// Domain id, e.g. `domain:dsa`
    pub domain_id: String,
}

#[api_model]
/// A candidate's row in one domain
pub struct EnrollmentResponse {
    pub domain_id: String,
    pub tier_id: String,
    /// `ACTIVE`, `WAITING_LIST`, `INACTIVE` or `COOLDOWN`
    pub status: String,
    pub target_tier_id: Option<String>,
    pub average_score: f64,
    pub participation_count: u32,
    pub enrolled_at: DateTime<Utc>,
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

impl From<CandidateDomainPerformance> for EnrollmentResponse {
    fn from(row: CandidateDomainPerformance) -> Self {
        Self {
            domain_id: row.domain_id.into_inner(),
            tier_id: row.current_tier_id.into_inner(),
            status: row.status.as_str().to_owned(),
            target_tier_id: row.target_tier_id.map(TierId::into_inner),
            average_score: row.average_score,
            participation_count: row.participation_count,
            enrolled_at: row.enrolled_at,
            cooldown_ends_at: row.cooldown_ends_at,
        }
    }
}

#[api_model]
pub struct WithdrawalResponse {
    pub candidate_id: String,
    pub domains: Vec<String>,
    /// Waiting candidates seated in the freed slots
    pub backfilled: Vec<String>,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            candidate_id: withdrawal.candidate.id.into_inner(),
            domains: withdrawal.domains.into_iter().map(DomainId::into_inner).collect(),
            backfilled: ids(withdrawal.backfilled),
        }
    }
}

#[api_model]
/// Graded exam attempt
pub struct ScoreRequest {
    /// Idempotency key; a repeated id is refused
    pub attempt_id: String,
    pub candidate_id: String,
    pub domain_id: String,
    /// Real number in `[0, 100]`
    pub score: f64,
    /// When the attempt was graded; defaults to now
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[api_model]
pub struct PlacementResponse {
    pub candidate_id: String,
    pub tier_id: String,
    pub tier_level: u8,
    pub status: String,
    pub target_tier_id: Option<String>,
    pub average_score: f64,
    pub participation_count: u32,
    /// `unchanged`, `promoted`, `rejoined`, `demoted`, `waitlisted` or `cooldown_hold`
    pub movement: String,
    /// Occupant moved to the waiting list to make room
    pub displaced: Option<String>,
    pub backfilled: Vec<String>,
    pub cooldown_ends_at: Option<DateTime<Utc>>,
}

impl From<PlacementOutcome> for PlacementResponse {
    fn from(outcome: PlacementOutcome) -> Self {
        Self {
            candidate_id: outcome.candidate_id.into_inner(),
            tier_id: outcome.tier_id.into_inner(),
            tier_level: outcome.tier_level.get(),
            status: outcome.status.as_str().to_owned(),
            target_tier_id: outcome.target_tier_id.map(TierId::into_inner),
            average_score: outcome.average_score,
            participation_count: outcome.participation_count,
            movement: outcome.movement.as_str().to_owned(),
            displaced: outcome.displaced.map(CandidateId::into_inner),
            backfilled: ids(outcome.backfilled),
            cooldown_ends_at: outcome.cooldown_ends_at,
        }
    }
}

#[api_model]
pub struct DomainStatusResponse {
    pub candidate_id: String,
    pub domain_id: String,
    pub tier_id: String,
    pub tier_level: u8,
    pub tier_name: String,
    pub status: String,
    pub target_tier_id: Option<String>,
    pub average_score: f64,
    pub participation_count: u32,
    /// `0` to `1`; absent at the top tier
    pub progress_to_next_tier: Option<f64>,
    pub next_tier_id: Option<String>,
    pub cooldown_ends_at: Option<DateTime<Utc>>,
    pub last_active: Option<DateTime<Utc>>,
    pub tier_assigned_date: DateTime<Utc>,
}

impl From<CandidateDomainStatus> for DomainStatusResponse {
    fn from(status: CandidateDomainStatus) -> Self {
        Self {
            candidate_id: status.candidate_id.into_inner(),
            domain_id: status.domain_id.into_inner(),
            tier_id: status.tier_id.into_inner(),
            tier_level: status.tier_level.get(),
            tier_name: status.tier_name,
            status: status.status.as_str().to_owned(),
            target_tier_id: status.target_tier_id.map(TierId::into_inner),
            average_score: status.average_score,
            participation_count: status.participation_count,
            progress_to_next_tier: status.progress_to_next_tier,
            next_tier_id: status.next_tier_id.map(TierId::into_inner),
            cooldown_ends_at: status.cooldown_ends_at,
            last_active: status.last_active,
            tier_assigned_date: status.tier_assigned_date,
        }
    }
}

#[api_model]
pub struct AttemptResponse {
    pub attempt_id: String,
    pub score: f64,
    pub participation_count: u32,
    pub submitted_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl From<ExamAttempt> for AttemptResponse {
    fn from(attempt: ExamAttempt) -> Self {
        Self {
            attempt_id: attempt.attempt_id.into_inner(),
            score: attempt.score,
            participation_count: attempt.participation_count,
            submitted_at: attempt.submitted_at,
            recorded_at: attempt.recorded_at,
        }
    }
}

#[api_model]
/// Anonymized listing row
pub struct RankedCandidateResponse {
    pub candidate_id_anonymized: String,
    pub average_score: f64,
    /// `ACTIVE`, or `WAITING_LIST` for a candidate still holding this tier
    pub status: String,
    pub rank: u32,
}

impl From<RankedCandidate> for RankedCandidateResponse {
    fn from(row: RankedCandidate) -> Self {
        Self {
            candidate_id_anonymized: row.candidate_id_anonymized,
            average_score: row.average_score,
            status: row.status.as_str().to_owned(),
            rank: row.rank,
        }
    }
}

#[api_model]
pub struct CapacityRequest {
    /// Omit or `null` for an unbounded tier
    #[serde(default)]
    pub max_slots: Option<u32>,
}

#[api_model]
pub struct CapacityResponse {
    pub tier_id: String,
    pub max_slots: Option<u32>,
    pub backfilled: Vec<String>,
}

impl From<CapacityChange> for CapacityResponse {
    fn from(change: CapacityChange) -> Self {
        Self {
            tier_id: change.tier.id.into_inner(),
            max_slots: change.tier.max_slots,
            backfilled: ids(change.backfilled),
        }
    }
}
