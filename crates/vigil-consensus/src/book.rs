// crates/vigil-consensus/src/book.rs
//
// Per-target consensus state: the latest record and its contributor set.
//
// The pair is stored as one map entry and replaced in a single insert, so a
// reader never observes a record from one round with contributors from another.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use vigil_core::{ConsensusRecord, ConsensusView, NodeId, TargetId};

/// The outcome of the most recent successful resolution of a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Round {
    pub record: ConsensusRecord,
    /// Deduplicated in-window reporters, first-seen order.
    pub contributors: Vec<NodeId>,
}

/// Latest round per target. Overwritten, never versioned.
#[derive(Debug, Default)]
pub struct ConsensusBook {
    rounds: DashMap<TargetId, Round>,
}

impl ConsensusBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the target's record and contributor set in one step.
    pub fn publish(&self, target_id: TargetId, record: ConsensusRecord, contributors: Vec<NodeId>) {
        self.rounds.insert(
            target_id,
            Round {
                record,
                contributors,
            },
        );
    }

    /// Copy of the target's latest round, if it was ever resolved.
    pub fn round(&self, target_id: TargetId) -> Option<Round> {
        self.rounds.get(&target_id).map(|r| r.value().clone())
    }

    /// Every resolved target, ascending.
    pub fn targets(&self) -> Vec<TargetId> {
        let mut targets: Vec<TargetId> = self.rounds.iter().map(|r| *r.key()).collect();
        targets.sort_unstable();
        targets
    }
}

impl ConsensusView for ConsensusBook {
    fn consensus(&self, target_id: TargetId) -> ConsensusRecord {
        self.rounds
            .get(&target_id)
            .map(|r| r.record.clone())
            .unwrap_or_default()
    }

    fn contributors(&self, target_id: TargetId) -> Vec<NodeId> {
        self.rounds
            .get(&target_id)
            .map(|r| r.contributors.clone())
            .unwrap_or_default()
    }
}
