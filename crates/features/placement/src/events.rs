use apex_domain::ids::{CandidateId, DomainId, TierId};
use apex_domain::performance::CandidateStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementReason {
    Enrolled,
    Promoted,
    /// Regained a slot in its own tier after waiting for it.
    Rejoined,
    Demoted,
    /// Qualified for a full tier and lost the comparison with its lowest occupant.
    Waitlisted,
    /// Pushed out of a full tier by a higher average.
    Displaced,
    /// Took a slot freed in the tier it was waiting for.
    Backfilled,
    CooldownExpired,
    Left,
    Withdrawn,
}

impl PlacementReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enrolled => "enrolled",
            Self::Promoted => "promoted",
            Self::Rejoined => "rejoined",
            Self::Demoted => "demoted",
            Self::Waitlisted => "waitlisted",
            Self::Displaced => "displaced",
            Self::Backfilled => "backfilled",
            Self::CooldownExpired => "cooldown_expired",
            Self::Left => "left",
            Self::Withdrawn => "withdrawn",
        }
    }
}

/// One candidate's tier or status change, published after the transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementChanged {
    pub domain_id: DomainId,
    pub candidate_id: CandidateId,
    pub reason: PlacementReason,
    pub from_tier: Option<TierId>,
    /// `None` once the candidate is withdrawn from the domain.
    pub to_tier: Option<TierId>,
    pub status: Option<CandidateStatus>,
    pub at: DateTime<Utc>,
}
