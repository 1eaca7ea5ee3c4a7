// crates/vigil-core/src/events.rs
//
// Notifications published by the engine to subscribed collaborators
// (frontends, node clients, auditors).

use serde::{Deserialize, Serialize};

use crate::report::ReportStatus;
use crate::{Amount, NodeId, TargetId, Timestamp};

/// Events emitted by the consensus resolver and the reward engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A target's window produced a valid verdict.
    ConsensusReached {
        target_id: TargetId,
        status: ReportStatus,
        average_response_time: u64,
        vote_count: u64,
        resolved_at: Timestamp,
        /// Contributor set of this round, in first-seen order.
        contributors: Vec<NodeId>,
    },
    /// One contributor was credited for a settled round.
    RewardPaid {
        target_id: TargetId,
        node_id: NodeId,
        /// Balance that received the credit.
        recipient: NodeId,
        amount: Amount,
        resolved_at: Timestamp,
    },
    /// A round was settled; carries the round total.
    RoundSettled {
        target_id: TargetId,
        resolved_at: Timestamp,
        total: Amount,
        paid_nodes: usize,
    },
}

impl EngineEvent {
    /// The target this event concerns.
    pub fn target_id(&self) -> TargetId {
        match self {
            EngineEvent::ConsensusReached { target_id, .. }
            | EngineEvent::RewardPaid { target_id, .. }
            | EngineEvent::RoundSettled { target_id, .. } => *target_id,
        }
    }
}
