//! # Ladder Validation
//!
//! Pure checks over a proposed set of tiers and their active thresholds. Nothing is
//! persisted here; callers store a ladder only after [`validate_ladder`] succeeds.
//!
//! ## Rules
//! 1. **Coverage**: every tier has exactly one active threshold.
//! 2. **Shape**: each range satisfies `min <= max <= 100`.
//! 3. **Continuity**: ordered by tier level, the ranges cover `[0, 100]` with no overlap
//!    and no gap. Neighbours may share a boundary point (`[0, 40] [40, 60]`) or step by one
//!    whole point (`[0, 39] [40, 59]`).
//!
//! All violations are collected so an administrator can fix a ladder in one pass.

use apex_domain::constants::{MAX_SCORE, MIN_SCORE};
use apex_domain::ids::TierId;
use apex_domain::ladder::{ScoreRange, Tier, TierLevel, TierThreshold};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LadderViolation {
    /// The domain has no tiers at all.
    NoTiers,
    /// A threshold points at a tier outside the domain.
    UnknownTier {
        #[cfg_attr(feature = "server", schema(value_type = String))]
        tier_id: TierId,
    },
    InvalidRange { tier_level: u8, min: u8, max: u8 },
    DuplicateActive { tier_level: u8, count: usize },
    MissingThreshold { tier_level: u8 },
    /// `upper` starts below the end of `lower`.
    Overlap { lower: u8, upper: u8 },
    /// Scores `from..=to` map to no tier. `lower`/`upper` are the neighbouring levels.
    Gap { from: u8, to: u8, lower: Option<u8>, upper: Option<u8> },
}

impl fmt::Display for LadderViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTiers => f.write_str("domain has no tiers"),
            Self::UnknownTier { tier_id } => {
                write!(f, "threshold references unknown tier {tier_id}")
            },
            Self::InvalidRange { tier_level, min, max } => {
                write!(f, "tier {tier_level} has invalid range [{min}, {max}]")
            },
            Self::DuplicateActive { tier_level, count } => {
                write!(f, "tier {tier_level} has {count} active thresholds")
            },
            Self::MissingThreshold { tier_level } => {
                write!(f, "tier {tier_level} has no active threshold")
            },
            Self::Overlap { lower, upper } => write!(f, "tier {upper} overlaps tier {lower}"),
            Self::Gap { from, to, lower, upper } => {
                write!(f, "scores {from}..={to} are not covered")?;
                match (lower, upper) {
                    (Some(lower), Some(upper)) => {
                        write!(f, " between tier {lower} and tier {upper}")
                    },
                    (Some(lower), None) => write!(f, " above tier {lower}"),
                    (None, Some(upper)) => write!(f, " below tier {upper}"),
                    (None, None) => Ok(()),
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ladder: {}", summarize(.violations))]
pub struct LadderValidationError {
    pub violations: Vec<LadderViolation>,
}

fn summarize(violations: &[LadderViolation]) -> String {
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Validates `thresholds` as the active ladder of `tiers`. Inactive thresholds are ignored.
///
/// # Errors
/// Returns every [`LadderViolation`] found.
pub fn validate_ladder(
    tiers: &[Tier],
    thresholds: &[TierThreshold],
) -> Result<(), LadderValidationError> {
    if tiers.is_empty() {
        return Err(LadderValidationError { violations: vec![LadderViolation::NoTiers] });
    }

    let mut violations = Vec::new();
    let mut by_level: BTreeMap<TierLevel, Vec<ScoreRange>> = BTreeMap::new();

    for threshold in thresholds.iter().filter(|t| t.is_active) {
        let Some(tier) = tiers.iter().find(|tier| tier.id == threshold.tier_id) else {
            violations.push(LadderViolation::UnknownTier { tier_id: threshold.tier_id.clone() });
            continue;
        };
        by_level.entry(tier.level).or_default().push(threshold.range);
    }

    let mut chain = Vec::with_capacity(tiers.len());
    for tier in tiers {
        let level = tier.level.get();
        match by_level.get(&tier.level).map(Vec::as_slice) {
            None | Some([]) => {
                violations.push(LadderViolation::MissingThreshold { tier_level: level });
            },
            Some(ranges) => {
                if ranges.len() > 1 {
                    violations.push(LadderViolation::DuplicateActive {
                        tier_level: level,
                        count: ranges.len(),
                    });
                }
                let range = ranges[0];
                if range.is_well_formed() {
                    chain.push((tier.level, range));
                } else {
                    violations.push(LadderViolation::InvalidRange {
                        tier_level: level,
                        min: range.min,
                        max: range.max,
                    });
                }
            }
        }
    }

    chain.sort_by_key(|(level, _)| *level);
    check_continuity(&chain, &mut violations);

    if violations.is_empty() { Ok(()) } else { Err(LadderValidationError { violations }) }
}

fn check_continuity(chain: &[(TierLevel, ScoreRange)], violations: &mut Vec<LadderViolation>) {
    let (Some(&(first_level, first)), Some(&(last_level, last))) = (chain.first(), chain.last())
    else {
        return;
    };

    if first.min > MIN_SCORE {
        violations.push(LadderViolation::Gap {
            from: MIN_SCORE,
            to: first.min - 1,
            lower: None,
            upper: Some(first_level.get()),
        });
    }

    for pair in chain.windows(2) {
        let [(lower_level, lower), (upper_level, upper)] = pair else { continue };
        if upper.min < lower.max {
            violations.push(LadderViolation::Overlap {
                lower: lower_level.get(),
                upper: upper_level.get(),
            });
        } else if upper.min > lower.max.saturating_add(1) {
            violations.push(LadderViolation::Gap {
                from: lower.max + 1,
                to: upper.min - 1,
                lower: Some(lower_level.get()),
                upper: Some(upper_level.get()),
            });
        }
    }

    if last.max < MAX_SCORE {
        violations.push(LadderViolation::Gap {
            from: last.max + 1,
            to: MAX_SCORE,
            lower: Some(last_level.get()),
            upper: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apex_domain::features::TierFeatures;
    use apex_domain::ids::DomainId;
    use chrono::Utc;

    fn ladder(ranges: &[(u8, u8)]) -> (Vec<Tier>, Vec<TierThreshold>) {
        let domain = DomainId::new("domain:dsa");
        let tiers: Vec<_> = (1..=ranges.len())
            .map(|level| {
                let level = u8::try_from(level).unwrap();
                Tier {
                    id: TierId::new(format!("tier:dsa-{level}")),
                    domain_id: domain.clone(),
                    level: TierLevel::new(level).unwrap(),
                    name: format!("Tier {level}"),
                    max_slots: None,
                    yearly_cost: 0,
                    features: TierFeatures::empty(),
                }
            })
            .collect();
        let thresholds = tiers
            .iter()
            .zip(ranges)
            .map(|(tier, &(min, max))| TierThreshold {
                domain_id: domain.clone(),
                tier_id: tier.id.clone(),
                range: ScoreRange::new(min, max),
                is_active: true,
                effective_date: Utc::now(),
            })
            .collect();
        (tiers, thresholds)
    }

    #[test]
    fn accepts_whole_point_and_shared_boundaries() {
        let (tiers, thresholds) = ladder(&[(0, 39), (40, 60), (60, 100)]);
        assert!(validate_ladder(&tiers, &thresholds).is_ok());
    }

    #[test]
    fn reports_gap_and_overlap_together() {
        let (tiers, thresholds) = ladder(&[(0, 39), (45, 70), (65, 100)]);
        let err = validate_ladder(&tiers, &thresholds).unwrap_err();

        assert_eq!(
            err.violations,
            vec![
                LadderViolation::Gap { from: 40, to: 44, lower: Some(1), upper: Some(2) },
                LadderViolation::Overlap { lower: 2, upper: 3 },
            ]
        );
    }

    #[test]
    fn ladder_must_span_the_whole_scale() {
        let (tiers, thresholds) = ladder(&[(10, 50), (51, 90)]);
        let err = validate_ladder(&tiers, &thresholds).unwrap_err();

        assert_eq!(err.violations.len(), 2);
        assert!(err.to_string().contains("scores 0..=9 are not covered below tier 1"));
        assert!(err.to_string().contains("scores 91..=100 are not covered above tier 2"));
    }

    #[test]
    fn inactive_thresholds_do_not_count() {
        let (tiers, mut thresholds) = ladder(&[(0, 49), (50, 100)]);
        thresholds[1].is_active = false;

        let err = validate_ladder(&tiers, &thresholds).unwrap_err();
        assert!(err.violations.contains(&LadderViolation::MissingThreshold { tier_level: 2 }));
    }

    #[test]
    fn duplicate_active_thresholds_are_flagged() {
        let (tiers, mut thresholds) = ladder(&[(0, 49), (50, 100)]);
        thresholds.push(thresholds[1].clone());

        let err = validate_ladder(&tiers, &thresholds).unwrap_err();
        let duplicate = LadderViolation::DuplicateActive { tier_level: 2, count: 2 };
        assert_eq!(err.violations, vec![duplicate]);
    }

    #[test]
    fn empty_ladder_is_rejected() {
        let err = validate_ladder(&[], &[]).unwrap_err();
        assert_eq!(err.violations, vec![LadderViolation::NoTiers]);
    }
}
