// crates/vigil-reputation/src/ledger.rs
//
// Reputation ledger: one bounded trust score per node.
//
// Entries live in a sharded concurrent map, so updates to different nodes
// never contend and each update to one node is a single atomic
// read-modify-write of its entry.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use vigil_core::{
    NodeId, ReputationEntry, ReputationView, Timestamp, VigilError, MAX_REPUTATION,
};

/// Score gained for agreeing with the verdict.
pub const AGREEMENT_REWARD: u8 = 1;

/// Score lost for disagreeing with the verdict. Twice the reward.
pub const DISAGREEMENT_PENALTY: u8 = 2;

/// Result of comparing a contributor's report with the winning status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Agreed,
    Disagreed,
}

impl From<bool> for Outcome {
    fn from(agreed: bool) -> Self {
        if agreed {
            Outcome::Agreed
        } else {
            Outcome::Disagreed
        }
    }
}

/// Holds the reputation entry of every node touched so far.
#[derive(Debug, Default)]
pub struct ReputationLedger {
    entries: DashMap<NodeId, ReputationEntry>,
}

impl ReputationLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entry for `node_id` at the initial score if it is absent.
    ///
    /// Returns the (possibly pre-existing) entry.
    pub fn touch(&self, node_id: NodeId, now: Timestamp) -> ReputationEntry {
        self.entries
            .entry(node_id)
            .or_insert_with(|| ReputationEntry::new(now))
            .value()
            .clone()
    }

    /// Apply one agreement outcome to a node, touching it first if needed.
    ///
    /// Agreement adds `AGREEMENT_REWARD` (capped at 100); disagreement
    /// subtracts `DISAGREEMENT_PENALTY` (floored at 0). Returns the updated entry.
    pub fn apply_outcome(
        &self,
        node_id: NodeId,
        outcome: impl Into<Outcome>,
        now: Timestamp,
    ) -> ReputationEntry {
        let mut entry = self
            .entries
            .entry(node_id)
            .or_insert_with(|| ReputationEntry::new(now));

        match outcome.into() {
            Outcome::Agreed => {
                entry.correct_count += 1;
                entry.score = entry
                    .score
                    .saturating_add(AGREEMENT_REWARD)
                    .min(MAX_REPUTATION);
            }
            Outcome::Disagreed => {
                entry.incorrect_count += 1;
                entry.score = entry.score.saturating_sub(DISAGREEMENT_PENALTY);
            }
        }
        entry.last_updated = now;
        entry.value().clone()
    }

    /// Full entry of a node.
    ///
    /// # Errors
    /// Returns `VigilError::NotFound` if the node was never touched.
    pub fn get(&self, node_id: NodeId) -> Result<ReputationEntry, VigilError> {
        self.entries
            .get(&node_id)
            .map(|e| e.value().clone())
            .ok_or_else(|| VigilError::NotFound(format!("reputation for node {}", node_id)))
    }

    /// Reinstate a persisted entry. Only used while loading state.
    pub fn restore(&self, node_id: NodeId, entry: ReputationEntry) {
        self.entries.insert(node_id, entry);
    }

    /// Number of nodes with an entry.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, sorted by node id.
    pub fn snapshot(&self) -> Vec<(NodeId, ReputationEntry)> {
        let mut all: Vec<(NodeId, ReputationEntry)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        all.sort_by_key(|(node_id, _)| *node_id);
        all
    }
}

impl ReputationView for ReputationLedger {
    fn score_of(&self, node_id: NodeId) -> u8 {
        self.entries.get(&node_id).map(|e| e.score).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::INITIAL_REPUTATION;

    #[test]
    fn untouched_node_scores_zero_and_is_not_found() {
        let ledger = ReputationLedger::new();
        assert_eq!(ledger.score_of(1), 0);
        assert!(matches!(ledger.get(1), Err(VigilError::NotFound(_))));
        assert!(!ledger.is_eligible(1, 1));
        assert!(ledger.is_eligible(1, 0));
    }

    #[test]
    fn touch_starts_at_fifty_and_is_idempotent() {
        let ledger = ReputationLedger::new();
        let entry = ledger.touch(1, 100);
        assert_eq!(entry.score, INITIAL_REPUTATION);
        assert_eq!(entry.last_updated, 100);

        ledger.apply_outcome(1, true, 110);
        let again = ledger.touch(1, 120);
        assert_eq!(again.score, 51);
        assert_eq!(again.last_updated, 110);
    }

    #[test]
    fn agreement_and_disagreement_deltas() {
        let ledger = ReputationLedger::new();
        let up = ledger.apply_outcome(1, Outcome::Agreed, 5);
        assert_eq!(up.score, 51);
        assert_eq!(up.correct_count, 1);
        assert_eq!(up.last_updated, 5);

        let down = ledger.apply_outcome(2, Outcome::Disagreed, 6);
        assert_eq!(down.score, 48);
        assert_eq!(down.incorrect_count, 1);
    }

    #[test]
    fn restored_entry_continues_from_its_score() {
        let ledger = ReputationLedger::new();
        let mut entry = ReputationEntry::new(10);
        entry.score = 99;
        entry.correct_count = 49;
        ledger.restore(8, entry);

        let next = ledger.apply_outcome(8, true, 20);
        assert_eq!(next.score, MAX_REPUTATION);
        assert_eq!(next.correct_count, 50);
        assert_eq!(ledger.touch(8, 30).score, MAX_REPUTATION);
    }

    #[test]
    fn long_runs_saturate_at_both_bounds() {
        let ledger = ReputationLedger::new();
        for step in 0..200 {
            ledger.apply_outcome(4, true, step);
        }
        assert_eq!(ledger.score_of(4), MAX_REPUTATION);

        for step in 0..200 {
            ledger.apply_outcome(5, false, step);
        }
        assert_eq!(ledger.score_of(5), 0);
    }

    #[test]
    fn penalty_floors_at_zero_from_one() {
        let ledger = ReputationLedger::new();
        for step in 0..24 {
            ledger.apply_outcome(6, false, step);
        }
        assert_eq!(ledger.score_of(6), 2);
        ledger.apply_outcome(6, true, 30);
        assert_eq!(ledger.score_of(6), 3);
        ledger.apply_outcome(6, false, 31);
        ledger.apply_outcome(6, false, 32);
        assert_eq!(ledger.score_of(6), 0);
    }

    #[test]
    fn eligibility_uses_threshold_inclusively() {
        let ledger = ReputationLedger::new();
        ledger.touch(9, 0);
        assert!(ledger.is_eligible(9, 50));
        assert!(!ledger.is_eligible(9, 51));
    }

    #[test]
    fn snapshot_is_sorted() {
        let ledger = ReputationLedger::new();
        ledger.touch(3, 0);
        ledger.touch(1, 0);
        ledger.touch(2, 0);
        let ids: Vec<NodeId> = ledger.snapshot().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(ledger.len(), 3);
    }
}
