mod common;

use apex_domain::performance::CandidateStatus;
use common::Harness;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn average_is_total_over_count(scores in prop::collection::vec(0.0f64..=100.0, 1..24)) {
        let h = Harness::new();
        let dsa = h.dsa();
        let a = h.candidate("Ada", &dsa);

        let mut total = 0.0;
        for (count, &score) in (1u32..).zip(&scores) {
            total += score;
            let outcome = h.score(&dsa, &a, score);
            prop_assert_eq!(outcome.participation_count, count);
            prop_assert!((outcome.average_score - total / f64::from(count)).abs() < 1e-9);
        }

        let attempts = h.placement.attempts(&a, &dsa).unwrap();
        prop_assert_eq!(attempts.len(), scores.len());
        let recorded: f64 = attempts.iter().map(|attempt| attempt.score).sum();
        prop_assert!((recorded - total).abs() < 1e-9);
    }

    #[test]
    fn only_demotion_enters_cooldown(scores in prop::collection::vec(0.0f64..=100.0, 1..16)) {
        let h = Harness::new();
        let dsa = h.dsa();
        let a = h.candidate("Ada", &dsa);

        for score in scores {
            let before = h.placement.candidate_status(&a, &dsa).unwrap();
            let outcome = h.score(&dsa, &a, score);
            let entered = outcome.status == CandidateStatus::Cooldown
                && before.status != CandidateStatus::Cooldown;
            if entered {
                prop_assert!(outcome.tier_level < before.tier_level);
                prop_assert!(outcome.cooldown_ends_at.is_some());
            }
        }
    }
}
