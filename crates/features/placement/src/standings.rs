//! Read models: recruiter listings and a candidate's own view of one domain.

use crate::anonymize::Anonymizer;
use apex_domain::ids::{CandidateId, DomainId, TierId};
use apex_domain::ladder::TierLevel;
use apex_domain::performance::{CandidateDomainPerformance, CandidateStatus};
use chrono::{DateTime, Utc};

/// One row of a recruiter-facing listing. Never carries the real candidate id.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub candidate_id_anonymized: String,
    pub average_score: f64,
    /// `WAITING_LIST` rows are listed under the tier they still hold.
    pub status: CandidateStatus,
    /// Competition rank: equal averages share a rank and the next rank skips ahead.
    pub rank: u32,
}

/// Ranks `rows` by average, highest first. Equal averages are listed in pseudonym order
/// so the listing does not hint at enrollment order.
pub(crate) fn rank<'a>(
    rows: impl IntoIterator<Item = &'a CandidateDomainPerformance>,
    anonymizer: &Anonymizer,
) -> Vec<RankedCandidate> {
    let mut listing: Vec<_> = rows
        .into_iter()
        .map(|row| (anonymizer.anonymize(&row.candidate_id), row.average_score, row.status))
        .collect();
    listing.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut ranked = Vec::with_capacity(listing.len());
    let mut previous: Option<f64> = None;
    let mut rank = 0;
    for (position, (pseudonym, average, status)) in (1u32..).zip(listing) {
        if previous.is_none_or(|p| p.total_cmp(&average).is_ne()) {
            rank = position;
            previous = Some(average);
        }
        ranked.push(RankedCandidate {
            candidate_id_anonymized: pseudonym,
            average_score: average,
            status,
            rank,
        });
    }
    ranked
}

/// A candidate's standing in one domain, as the candidate sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDomainStatus {
    pub candidate_id: CandidateId,
    pub domain_id: DomainId,
    pub tier_id: TierId,
    pub tier_level: TierLevel,
    pub tier_name: String,
    pub status: CandidateStatus,
    pub target_tier_id: Option<TierId>,
    pub average_score: f64,
    pub participation_count: u32,
    /// `[0, 1]` share of the way to the next tier's minimum. `None` at the top of the
    /// ladder, or while the domain's ladder is incomplete.
    pub progress_to_next_tier: Option<f64>,
    pub next_tier_id: Option<TierId>,
    pub cooldown_ends_at: Option<DateTime<Utc>>,
    pub last_active: Option<DateTime<Utc>>,
    pub tier_assigned_date: DateTime<Utc>,
}
