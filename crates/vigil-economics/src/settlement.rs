// crates/vigil-economics/src/settlement.rs
//
// Round settlement: credits reward balances for a finalized, not-yet-paid
// consensus round.
//
// The per-target settlement guard (`last_settled_at`) is held for the whole
// operation, so two settlements of the same target cannot interleave. All
// preconditions are checked and every payout is computed before the first
// balance is credited.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use vigil_core::{
    Amount, ConsensusView, EngineConfig, NodeId, PayoutResolver, ReputationView, TargetId,
    Timestamp, VigilError,
};

use crate::rewards::compute_reward;

/// One credited contributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub node_id: NodeId,
    /// Balance that received the credit.
    pub recipient: NodeId,
    /// Reputation score the reward was computed from.
    pub score: u8,
    pub amount: Amount,
}

/// Receipt of a settled round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub target_id: TargetId,
    /// `resolved_at` of the round that was paid.
    pub resolved_at: Timestamp,
    pub payouts: Vec<Payout>,
    /// Contributors below the reputation minimum.
    pub skipped: Vec<NodeId>,
    pub total: Amount,
}

/// Reward balances and per-target settlement guards.
#[derive(Debug, Default)]
pub struct RewardLedger {
    balances: DashMap<NodeId, Amount>,
    /// `resolved_at` of the last paid round per target. Absent = never settled.
    last_settled_at: DashMap<TargetId, Timestamp>,
}

impl RewardLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative balance credited to `recipient` (0 if never paid).
    pub fn balance_of(&self, recipient: NodeId) -> Amount {
        self.balances.get(&recipient).map(|b| *b).unwrap_or(0)
    }

    /// `resolved_at` of the last round paid for `target_id`.
    pub fn last_settled_at(&self, target_id: TargetId) -> Option<Timestamp> {
        self.last_settled_at.get(&target_id).map(|t| *t)
    }

    /// Number of targets with a settled round.
    pub fn settled_targets(&self) -> usize {
        self.last_settled_at.len()
    }

    /// All settlement guards, sorted by target.
    pub fn settled(&self) -> Vec<(TargetId, Timestamp)> {
        let mut all: Vec<(TargetId, Timestamp)> = self
            .last_settled_at
            .iter()
            .map(|t| (*t.key(), *t.value()))
            .collect();
        all.sort_by_key(|(target_id, _)| *target_id);
        all
    }

    /// Reinstate a persisted balance. Only used while loading state.
    pub fn restore_balance(&self, recipient: NodeId, amount: Amount) {
        self.balances.insert(recipient, amount);
    }

    /// Reinstate a persisted settlement guard. Only used while loading state.
    pub fn restore_settled(&self, target_id: TargetId, resolved_at: Timestamp) {
        self.last_settled_at.insert(target_id, resolved_at);
    }

    /// All non-zero balances, sorted by recipient.
    pub fn balances(&self) -> Vec<(NodeId, Amount)> {
        let mut all: Vec<(NodeId, Amount)> =
            self.balances.iter().map(|b| (*b.key(), *b.value())).collect();
        all.sort_by_key(|(recipient, _)| *recipient);
        all
    }

    /// Pay out the target's current consensus round.
    ///
    /// # Errors
    /// Returns `VigilError::InvalidState` (with nothing credited) if the
    /// target has no valid consensus, its current round was already paid,
    /// or its contributor set is empty. Errors from the payout resolver or
    /// the reward computation also abort before any credit.
    pub fn settle(
        &self,
        target_id: TargetId,
        consensus: &dyn ConsensusView,
        reputation: &dyn ReputationView,
        payout: &dyn PayoutResolver,
        config: &EngineConfig,
    ) -> Result<Settlement, VigilError> {
        // Step 1: A valid verdict must exist
        let record = consensus.consensus(target_id);
        if !record.is_valid {
            return Err(VigilError::InvalidState(format!(
                "target {} has no valid consensus",
                target_id
            )));
        }

        // Step 2: Each round is paid at most once. The entry guard is held
        // until the round is closed; rejected calls leave no entry behind.
        let guard = self.last_settled_at.entry(target_id);
        if let Entry::Occupied(last) = &guard {
            let last = *last.get();
            if last >= record.resolved_at {
                return Err(VigilError::InvalidState(format!(
                    "target {} round resolved at {} already settled (last settled {})",
                    target_id, record.resolved_at, last
                )));
            }
        }

        // Step 3: Someone must have contributed
        let contributors = consensus.contributors(target_id);
        if contributors.is_empty() {
            return Err(VigilError::InvalidState(format!(
                "target {} has an empty contributor set",
                target_id
            )));
        }

        // Step 4: Compute every payout before touching balances
        let mut payouts = Vec::with_capacity(contributors.len());
        let mut skipped = Vec::new();
        for node_id in contributors {
            if !reputation.is_eligible(node_id, config.min_reputation_for_rewards) {
                tracing::debug!(
                    "Target {}: node {} below reputation minimum {}, skipped",
                    target_id,
                    node_id,
                    config.min_reputation_for_rewards
                );
                skipped.push(node_id);
                continue;
            }
            let score = reputation.score_of(node_id);
            let amount = compute_reward(score, config.base_reward, config.reputation_multiplier)?;
            let recipient = payout.recipient_for(node_id)?;
            payouts.push(Payout {
                node_id,
                recipient,
                score,
                amount,
            });
        }

        // Step 5: Credit balances
        let mut total: Amount = 0;
        for p in &payouts {
            let mut balance = self.balances.entry(p.recipient).or_insert(0);
            *balance = balance.saturating_add(p.amount);
            total = total.saturating_add(p.amount);
        }

        // Step 6: Close the round
        guard.insert(record.resolved_at);

        tracing::info!(
            "Target {}: settled round {} ({} paid, {} skipped, total {})",
            target_id,
            record.resolved_at,
            payouts.len(),
            skipped.len(),
            total
        );

        Ok(Settlement {
            target_id,
            resolved_at: record.resolved_at,
            payouts,
            skipped,
            total,
        })
    }
}
