use apex_domain::features::TierFeatures;
use apex_domain::ids::{DomainId, TierId};
use apex_domain::ladder::{ScoreRange, Tier, TierLevel, TierThreshold};
use apex_ladder::{LadderViolation, validate_ladder};
use chrono::{DateTime, Utc};
use proptest::prelude::*;

/// Contiguous whole-point ranges from `cuts`, where each cut is the first score of the next tier.
fn ranges_from_cuts(cuts: &[u8]) -> Vec<ScoreRange> {
    let mut ranges = Vec::with_capacity(cuts.len() + 1);
    let mut min = 0;
    for &cut in cuts {
        ranges.push(ScoreRange::new(min, cut - 1));
        min = cut;
    }
    ranges.push(ScoreRange::new(min, 100));
    ranges
}

fn ladder(ranges: &[ScoreRange]) -> (Vec<Tier>, Vec<TierThreshold>) {
    let domain = DomainId::new("domain:prop");
    let tiers: Vec<_> = (1..=ranges.len())
        .map(|level| {
            let level = u8::try_from(level).unwrap();
            Tier {
                id: TierId::new(format!("tier:prop-{level}")),
                domain_id: domain.clone(),
                level: TierLevel::new(level).unwrap(),
                name: format!("Tier {level}"),
                max_slots: (level > 1).then_some(10),
                yearly_cost: 0,
                features: TierFeatures::empty(),
            }
        })
        .collect();
    let thresholds = tiers
        .iter()
        .zip(ranges)
        .map(|(tier, &range)| TierThreshold {
            domain_id: domain.clone(),
            tier_id: tier.id.clone(),
            range,
            is_active: true,
            effective_date: DateTime::<Utc>::UNIX_EPOCH,
        })
        .collect();
    (tiers, thresholds)
}

/// Up to four distinct cut points in `1..=100`, ascending.
fn cuts() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::btree_set(1u8..=100, 0..=4).prop_map(|set| set.into_iter().collect())
}

proptest! {
    #[test]
    fn contiguous_ladders_are_valid(cuts in cuts()) {
        let (tiers, thresholds) = ladder(&ranges_from_cuts(&cuts));
        prop_assert!(validate_ladder(&tiers, &thresholds).is_ok());
    }

    #[test]
    fn widening_a_step_opens_a_gap(cuts in cuts().prop_filter("needs two tiers", |c| !c.is_empty()), pick in any::<prop::sample::Index>()) {
        let mut ranges = ranges_from_cuts(&cuts);
        let lower = pick.index(ranges.len() - 1);
        // Shrink the lower range's top; the lower range must keep at least one point.
        prop_assume!(ranges[lower].max > ranges[lower].min);
        ranges[lower].max -= 1;

        let (tiers, thresholds) = ladder(&ranges);
        let err = validate_ladder(&tiers, &thresholds).unwrap_err();
        let lower_level = u8::try_from(lower + 1).unwrap();
        let is_gap_above_lower = |violation: &LadderViolation| {
            matches!(violation, LadderViolation::Gap { lower: Some(level), .. } if *level == lower_level)
        };
        prop_assert!(err.violations.iter().any(is_gap_above_lower), "{:?}", err.violations);
    }

    #[test]
    fn pushing_a_floor_down_overlaps(cuts in cuts().prop_filter("needs two tiers", |c| !c.is_empty()), pick in any::<prop::sample::Index>()) {
        let mut ranges = ranges_from_cuts(&cuts);
        let upper = 1 + pick.index(ranges.len() - 1);
        // min must drop below the lower tier's max, so move it two points down.
        prop_assume!(ranges[upper].min >= 2 && ranges[upper].min - 2 >= ranges[upper - 1].min);
        ranges[upper].min -= 2;

        let (tiers, thresholds) = ladder(&ranges);
        let err = validate_ladder(&tiers, &thresholds).unwrap_err();
        let upper_level = u8::try_from(upper + 1).unwrap();
        prop_assert!(err.violations.iter().any(|violation| matches!(
            violation,
            LadderViolation::Overlap { upper: level, .. } if *level == upper_level
        )), "{:?}", err.violations);
    }
}
