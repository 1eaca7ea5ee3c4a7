// crates/vigil-core/src/config.rs
//
// Consensus and reward parameters.
//
// These are set by an administrative collaborator and validated here, at
// configuration time, so evaluation never sees an impossible combination.

use serde::{Deserialize, Serialize};

use crate::error::VigilError;
use crate::reputation::MAX_REPUTATION;
use crate::Amount;

/// Number of most recent reports inspected per resolution.
pub const CONSENSUS_WINDOW_SIZE: usize = 10;

/// Largest `reputation_multiplier` for which `100 - adjusted` stays non-negative.
pub const MAX_REPUTATION_MULTIPLIER: u64 = 200;

/// Largest base reward for which a fully boosted reward still fits an `Amount`.
pub const MAX_BASE_REWARD: Amount = Amount::MAX / 2;

/// Engine parameters for consensus and reward settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum number of reports (and of votes) required for a consensus.
    #[serde(default = "default_min_reports")]
    pub min_reports_for_consensus: u64,

    /// Minimum winning vote share, in whole percent (0-100).
    #[serde(default = "default_threshold")]
    pub consensus_threshold: u64,

    /// Maximum age of a counted report, in seconds.
    #[serde(default = "default_time_window")]
    pub consensus_time_window: u64,

    /// Reward paid to a contributor with neutral reputation.
    #[serde(default = "default_base_reward")]
    pub base_reward: Amount,

    /// Percentage of the reputation boost applied to the base reward.
    #[serde(default = "default_reputation_multiplier")]
    pub reputation_multiplier: u64,

    /// Minimum score a contributor needs to be paid.
    #[serde(default = "default_min_reputation")]
    pub min_reputation_for_rewards: u8,
}

fn default_min_reports() -> u64 {
    3
}

fn default_threshold() -> u64 {
    66
}

fn default_time_window() -> u64 {
    300
}

fn default_base_reward() -> Amount {
    100
}

fn default_reputation_multiplier() -> u64 {
    50
}

fn default_min_reputation() -> u8 {
    30
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_reports_for_consensus: default_min_reports(),
            consensus_threshold: default_threshold(),
            consensus_time_window: default_time_window(),
            base_reward: default_base_reward(),
            reputation_multiplier: default_reputation_multiplier(),
            min_reputation_for_rewards: default_min_reputation(),
        }
    }
}

impl EngineConfig {
    /// Reject parameter combinations the engine cannot evaluate.
    ///
    /// # Errors
    /// Returns `VigilError::Configuration` describing the first violated bound.
    pub fn validate(&self) -> Result<(), VigilError> {
        if self.min_reports_for_consensus == 0 {
            return Err(VigilError::Configuration(
                "min_reports_for_consensus must be at least 1".to_string(),
            ));
        }
        if self.min_reports_for_consensus > CONSENSUS_WINDOW_SIZE as u64 {
            return Err(VigilError::Configuration(format!(
                "min_reports_for_consensus {} exceeds the consensus window of {} reports",
                self.min_reports_for_consensus, CONSENSUS_WINDOW_SIZE
            )));
        }
        if self.consensus_threshold > 100 {
            return Err(VigilError::Configuration(format!(
                "consensus_threshold {} exceeds 100 percent",
                self.consensus_threshold
            )));
        }
        if self.min_reputation_for_rewards > MAX_REPUTATION {
            return Err(VigilError::Configuration(format!(
                "min_reputation_for_rewards {} exceeds the maximum score of {}",
                self.min_reputation_for_rewards, MAX_REPUTATION
            )));
        }
        if self.reputation_multiplier > MAX_REPUTATION_MULTIPLIER {
            return Err(VigilError::Configuration(format!(
                "reputation_multiplier {} exceeds {}",
                self.reputation_multiplier, MAX_REPUTATION_MULTIPLIER
            )));
        }
        if self.base_reward > MAX_BASE_REWARD {
            return Err(VigilError::Configuration(format!(
                "base_reward {} exceeds {}",
                self.base_reward, MAX_BASE_REWARD
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_minimum_reports_rejected() {
        let config = EngineConfig {
            min_reports_for_consensus: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(VigilError::Configuration(_))));
    }

    #[test]
    fn minimum_reports_above_window_rejected() {
        let config = EngineConfig {
            min_reports_for_consensus: CONSENSUS_WINDOW_SIZE as u64 + 1,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(VigilError::Configuration(_))));

        let at_window = EngineConfig {
            min_reports_for_consensus: CONSENSUS_WINDOW_SIZE as u64,
            ..EngineConfig::default()
        };
        assert!(at_window.validate().is_ok());
    }

    #[test]
    fn threshold_above_hundred_rejected() {
        let config = EngineConfig {
            consensus_threshold: 101,
            ..EngineConfig::default()
        };
        assert!(matches!(config.validate(), Err(VigilError::Configuration(_))));
    }

    #[test]
    fn oversized_multiplier_and_reward_rejected() {
        let multiplier = EngineConfig {
            reputation_multiplier: MAX_REPUTATION_MULTIPLIER + 1,
            ..EngineConfig::default()
        };
        assert!(multiplier.validate().is_err());

        let reward = EngineConfig {
            base_reward: MAX_BASE_REWARD + 1,
            ..EngineConfig::default()
        };
        assert!(reward.validate().is_err());

        let min_rep = EngineConfig {
            min_reputation_for_rewards: 101,
            ..EngineConfig::default()
        };
        assert!(min_rep.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"consensus_threshold": 60}"#).unwrap();
        assert_eq!(config.consensus_threshold, 60);
        assert_eq!(config.min_reports_for_consensus, 3);
        assert_eq!(config.consensus_time_window, 300);
    }
}
