// crates/vigil-core/src/state.rs
//
// Durable engine state: everything besides the report log that must survive
// a restart for balances to stay monotonic and rounds to be paid only once.

use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusRecord;
use crate::reputation::ReputationEntry;
use crate::{Amount, NodeId, TargetId, Timestamp};

/// Latest consensus round of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRound {
    pub target_id: TargetId,
    pub record: ConsensusRecord,
    pub contributors: Vec<NodeId>,
}

/// Everything a state store hands back at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub rounds: Vec<StoredRound>,
    pub reputation: Vec<(NodeId, ReputationEntry)>,
    pub balances: Vec<(NodeId, Amount)>,
    /// `resolved_at` of the last settled round per target.
    pub settled: Vec<(TargetId, Timestamp)>,
}
