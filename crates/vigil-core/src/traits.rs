// crates/vigil-core/src/traits.rs
//
// Seams between the engine components. Each store owns its state exclusively;
// the other components only see it through these traits.

use crate::consensus::ConsensusRecord;
use crate::error::VigilError;
use crate::report::Report;
use crate::reputation::ReputationEntry;
use crate::state::{EngineState, StoredRound};
use crate::{Amount, NodeId, ReportId, TargetId, Timestamp};

/// Append-only store of observation reports.
///
/// Implemented by vigil-store (in-memory and RocksDB backends).
pub trait ReportLog: Send + Sync {
    /// Append a report and return its id. Ids are dense and start at zero.
    fn append(&self, report: Report) -> Result<ReportId, VigilError>;

    /// Ids of the most recent `limit` reports for a target, oldest first.
    /// Returns all of them when fewer exist.
    fn recent(&self, target_id: TargetId, limit: usize) -> Result<Vec<ReportId>, VigilError>;

    /// Fetch a report. Fails with `NotFound` for an id that was never assigned.
    fn get(&self, id: ReportId) -> Result<Report, VigilError>;

    /// Ids of every report submitted by a node, oldest first.
    fn by_node(&self, node_id: NodeId) -> Result<Vec<ReportId>, VigilError>;

    /// Total number of reports stored.
    fn len(&self) -> Result<u64, VigilError>;

    fn is_empty(&self) -> Result<bool, VigilError> {
        Ok(self.len()? == 0)
    }
}

/// Read access to the consensus resolver's per-target output.
///
/// Implemented by vigil-consensus (`ConsensusBook`).
pub trait ConsensusView: Send + Sync {
    /// Current record, or the invalid sentinel when none exists yet.
    fn consensus(&self, target_id: TargetId) -> ConsensusRecord;

    /// Contributor set of the most recent resolution, first-seen order.
    fn contributors(&self, target_id: TargetId) -> Vec<NodeId>;
}

/// Read access to reputation scores.
///
/// Implemented by vigil-reputation (`ReputationLedger`).
pub trait ReputationView: Send + Sync {
    /// Score of a node; 0 before the node was first touched.
    fn score_of(&self, node_id: NodeId) -> u8;

    /// Whether a node's score reaches `threshold`.
    fn is_eligible(&self, node_id: NodeId, threshold: u8) -> bool {
        self.score_of(node_id) >= threshold
    }
}

/// Resolves which balance receives a contributor's payout.
///
/// Implemented by vigil-economics (`SelfPayout`, `MappedPayout`).
pub trait PayoutResolver: Send + Sync {
    fn recipient_for(&self, node_id: NodeId) -> Result<NodeId, VigilError>;
}

/// Durable home of the engine state derived from reports.
///
/// Each save is atomic. Values are absolute (latest round, current entry,
/// current balance), so a later save of the same key supersedes an earlier one.
///
/// Implemented by vigil-store (`RocksReportLog`).
pub trait StateStore: Send + Sync {
    /// Persist a freshly published round and the reputation entries it updated.
    fn save_resolution(
        &self,
        round: &StoredRound,
        reputation: &[(NodeId, ReputationEntry)],
    ) -> Result<(), VigilError>;

    /// Persist a settled round: its guard and the credited balances.
    fn save_settlement(
        &self,
        target_id: TargetId,
        resolved_at: Timestamp,
        balances: &[(NodeId, Amount)],
    ) -> Result<(), VigilError>;

    /// Load everything saved so far.
    fn load_state(&self) -> Result<EngineState, VigilError>;
}
