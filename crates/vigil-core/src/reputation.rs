// crates/vigil-core/src/reputation.rs

use serde::{Deserialize, Serialize};

use crate::Timestamp;

/// Score every node starts with on first touch.
pub const INITIAL_REPUTATION: u8 = 50;

/// Upper clamp of a reputation score. The lower clamp is zero.
pub const MAX_REPUTATION: u8 = 100;

/// Accumulated trustworthiness of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationEntry {
    /// Trust score in [0, 100].
    pub score: u8,
    /// Number of rounds in which the node agreed with the verdict.
    pub correct_count: u64,
    /// Number of rounds in which the node disagreed with the verdict.
    pub incorrect_count: u64,
    /// Last time the entry was touched (Unix seconds).
    pub last_updated: Timestamp,
}

impl ReputationEntry {
    /// A freshly touched entry.
    pub fn new(now: Timestamp) -> Self {
        Self {
            score: INITIAL_REPUTATION,
            correct_count: 0,
            incorrect_count: 0,
            last_updated: now,
        }
    }
}
