// crates/vigil-economics/src/rewards.rs
//
// Per-contributor reward computation.
//
//   boost    = score - 50                                  (signed)
//   adjusted = floor(|boost| * reputation_multiplier / 100)
//   reward   = floor(base_reward * (100 + adjusted) / 100) if boost >= 0
//            = floor(base_reward * (100 - adjusted) / 100) otherwise
//
// Each division truncates, in exactly this order. Simplifying the formula
// algebraically changes the result for some inputs.

use vigil_core::{Amount, VigilError};

/// Score at which a contributor earns exactly the base reward.
pub const NEUTRAL_REPUTATION: u8 = 50;

/// Compute the reward of one contributor with reputation `score`.
///
/// Intermediate products run in `u128`, so no step can overflow.
///
/// # Errors
/// Returns `VigilError::Configuration` if `reputation_multiplier` pushes the
/// penalty past 100% or the reward does not fit an `Amount`. Neither happens
/// with a validated `EngineConfig`.
pub fn compute_reward(
    score: u8,
    base_reward: Amount,
    reputation_multiplier: u64,
) -> Result<Amount, VigilError> {
    let boost = i64::from(score) - i64::from(NEUTRAL_REPUTATION);
    let adjusted = u128::from(boost.unsigned_abs()) * u128::from(reputation_multiplier) / 100;

    let factor = if boost >= 0 {
        100 + adjusted
    } else {
        100u128.checked_sub(adjusted).ok_or_else(|| {
            VigilError::Configuration(format!(
                "reputation_multiplier {} penalises score {} below zero",
                reputation_multiplier, score
            ))
        })?
    };

    let reward = u128::from(base_reward) * factor / 100;
    Amount::try_from(reward).map_err(|_| {
        VigilError::Configuration(format!("reward {} overflows the amount type", reward))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_score_earns_base_reward() {
        assert_eq!(compute_reward(50, 100, 50).unwrap(), 100);
        assert_eq!(compute_reward(50, 7, 200).unwrap(), 7);
    }

    #[test]
    fn boost_and_penalty() {
        // boost 50 -> adjusted 25 -> 125%
        assert_eq!(compute_reward(100, 100, 50).unwrap(), 125);
        // boost -50 -> adjusted 25 -> 75%
        assert_eq!(compute_reward(0, 100, 50).unwrap(), 75);
        // boost -2 -> adjusted 1 -> 99%
        assert_eq!(compute_reward(48, 100, 50).unwrap(), 99);
    }

    #[test]
    fn truncation_happens_at_each_step() {
        // adjusted = floor(3 * 50 / 100) = 1, reward = floor(33 * 101 / 100) = 33
        assert_eq!(compute_reward(53, 33, 50).unwrap(), 33);
        // adjusted = floor(1 * 50 / 100) = 0, so exactly the base reward; the
        // single-division form floor(1000 * 10050 / 10000) would give 1005.
        assert_eq!(compute_reward(51, 1_000, 50).unwrap(), 1_000);
        // floor(999 * 103 / 100) = 1028
        assert_eq!(compute_reward(56, 999, 50).unwrap(), 1_028);
    }

    #[test]
    fn small_deltas_may_truncate_to_equality() {
        assert_eq!(compute_reward(51, 100, 50).unwrap(), 100);
        assert_eq!(compute_reward(49, 100, 50).unwrap(), 100);
        assert!(compute_reward(52, 100, 50).unwrap() > 100);
        assert!(compute_reward(48, 100, 50).unwrap() < 100);
    }

    #[test]
    fn monotone_in_score() {
        let mut previous = 0;
        for score in 0..=100u8 {
            let reward = compute_reward(score, 1_000, 50).unwrap();
            assert!(reward >= previous, "score {} decreased reward", score);
            previous = reward;
        }
    }

    #[test]
    fn excessive_multiplier_is_rejected_not_wrapped() {
        assert!(compute_reward(0, 100, 250).is_err());
        assert_eq!(compute_reward(0, 100, 200).unwrap(), 0);
    }

    #[test]
    fn largest_valid_reward_fits() {
        let base = Amount::MAX / 2;
        assert_eq!(compute_reward(100, base, 200).unwrap(), base * 2);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use vigil_core::config::{MAX_BASE_REWARD, MAX_REPUTATION_MULTIPLIER};

    proptest! {
        #[test]
        fn reward_moves_with_reputation(
            raw_score in any::<u8>(),
            base in 0..=MAX_BASE_REWARD,
            multiplier in 0..=MAX_REPUTATION_MULTIPLIER,
        ) {
            let score = raw_score % 101;
            let neutral = compute_reward(NEUTRAL_REPUTATION, base, multiplier).unwrap();
            prop_assert_eq!(neutral, base);

            let reward = compute_reward(score, base, multiplier).unwrap();
            if score > NEUTRAL_REPUTATION {
                prop_assert!(reward >= neutral);
            } else if score < NEUTRAL_REPUTATION {
                prop_assert!(reward <= neutral);
            }

            if score < 100 {
                let next = compute_reward(score + 1, base, multiplier).unwrap();
                prop_assert!(next >= reward);
            }
        }

        #[test]
        fn reward_changes_once_adjustment_is_whole(
            delta in 1u8..=50,
            base in 100..=MAX_BASE_REWARD,
            multiplier in 1..=MAX_REPUTATION_MULTIPLIER,
        ) {
            // Once |boost| * multiplier reaches 100, the adjustment is at least
            // one percent, which moves any base of at least 100.
            prop_assume!(u64::from(delta) * multiplier >= 100);
            let up = compute_reward(NEUTRAL_REPUTATION + delta, base, multiplier).unwrap();
            let down = compute_reward(NEUTRAL_REPUTATION - delta, base, multiplier).unwrap();
            prop_assert!(up > base);
            prop_assert!(down < base);
        }
    }
}

