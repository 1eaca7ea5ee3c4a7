// crates/vigil-economics/src/payout.rs
//
// Payout recipient resolution: which balance a contributor's reward lands in.

use std::collections::HashMap;

use vigil_core::{NodeId, PayoutResolver, VigilError};

/// Credit each node's own balance.
#[derive(Debug, Default, Clone, Copy)]
pub struct SelfPayout;

impl PayoutResolver for SelfPayout {
    fn recipient_for(&self, node_id: NodeId) -> Result<NodeId, VigilError> {
        Ok(node_id)
    }
}

/// Explicit node -> beneficiary table. Unmapped nodes are paid themselves.
#[derive(Debug, Default, Clone)]
pub struct MappedPayout {
    beneficiaries: HashMap<NodeId, NodeId>,
}

impl MappedPayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `node_id`'s rewards to `beneficiary`.
    pub fn with_beneficiary(mut self, node_id: NodeId, beneficiary: NodeId) -> Self {
        self.beneficiaries.insert(node_id, beneficiary);
        self
    }
}

impl PayoutResolver for MappedPayout {
    fn recipient_for(&self, node_id: NodeId) -> Result<NodeId, VigilError> {
        Ok(self.beneficiaries.get(&node_id).copied().unwrap_or(node_id))
    }
}
