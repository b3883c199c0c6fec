//! The ladder in force at a given instant.

use crate::validator::{LadderValidationError, validate_ladder};
use apex_database::DomainPartition;
use apex_domain::ids::TierId;
use apex_domain::ladder::{ScoreRange, Tier, TierThreshold};
use chrono::{DateTime, Utc};

/// One tier together with the range it currently covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Rung {
    pub tier: Tier,
    pub range: ScoreRange,
    pub effective_date: DateTime<Utc>,
}

/// A validated, ordered ladder. Always holds at least one rung and the first rung
/// starts at score 0.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLadder {
    rungs: Vec<Rung>,
}

impl ActiveLadder {
    /// Resolves the in-force version of every tier at `at` and validates the result.
    ///
    /// Per tier the latest version with `effective_date <= at` wins. When that version is
    /// inactive the tier is withdrawn from the ladder at `at`; it keeps its rows but no
    /// score maps to it.
    ///
    /// # Errors
    /// Returns the violations when the in-force set is not a complete ladder.
    pub fn resolve(
        partition: &DomainPartition,
        at: DateTime<Utc>,
    ) -> Result<Self, LadderValidationError> {
        let mut tiers = Vec::new();
        let mut in_force = Vec::new();

        for tier in partition.tiers() {
            match current_version(partition.thresholds(), &tier.id, at) {
                Some(version) if !version.is_active => {}
                Some(version) => {
                    tiers.push(tier.clone());
                    in_force.push(version.clone());
                }
                None => tiers.push(tier.clone()),
            }
        }

        validate_ladder(&tiers, &in_force)?;

        let rungs = tiers
            .into_iter()
            .zip(in_force)
            .map(|(tier, version)| Rung {
                tier,
                range: version.range,
                effective_date: version.effective_date,
            })
            .collect();
        Ok(Self { rungs })
    }

    #[must_use]
    pub fn rungs(&self) -> &[Rung] {
        &self.rungs
    }

    /// Lowest rung, where new enrollments start. The entry tier cannot be withdrawn, so
    /// this is always level 1.
    #[must_use]
    pub fn entry(&self) -> &Rung {
        &self.rungs[0]
    }

    #[must_use]
    pub fn rung(&self, tier: &TierId) -> Option<&Rung> {
        self.rungs.iter().find(|rung| &rung.tier.id == tier)
    }

    /// The tier an average belongs to: the highest rung whose minimum does not exceed it.
    /// Shared boundaries go to the upper tier and fractional averages between whole-point
    /// steps stay in the lower one.
    #[must_use]
    pub fn tier_for(&self, average: f64) -> &Rung {
        self.rungs
            .iter()
            .rev()
            .find(|rung| f64::from(rung.range.min) <= average)
            .unwrap_or_else(|| self.entry())
    }

    /// The next rung up from `tier`, if any.
    #[must_use]
    pub fn rung_above(&self, tier: &TierId) -> Option<&Rung> {
        let position = self.rungs.iter().position(|rung| &rung.tier.id == tier)?;
        self.rungs.get(position + 1)
    }

    /// Share of the way from the current tier's minimum to the next tier's minimum,
    /// clamped to `[0, 1]`. `None` at the top of the ladder or for a withdrawn tier.
    #[must_use]
    pub fn progress_to_next(&self, tier: &TierId, average: f64) -> Option<f64> {
        let current = self.rung(tier)?;
        let next = self.rung_above(tier)?;
        let span = f64::from(next.range.min) - f64::from(current.range.min);
        if span <= 0.0 {
            return Some(1.0);
        }
        Some(((average - f64::from(current.range.min)) / span).clamp(0.0, 1.0))
    }
}

/// Latest version of `tier` in force at `at`; later insertion wins on equal dates.
pub(crate) fn current_version<'a>(
    thresholds: &'a [TierThreshold],
    tier: &TierId,
    at: DateTime<Utc>,
) -> Option<&'a TierThreshold> {
    thresholds
        .iter()
        .enumerate()
        .filter(|(_, version)| &version.tier_id == tier && version.effective_date <= at)
        .max_by_key(|(index, version)| (version.effective_date, *index))
        .map(|(_, version)| version)
}
