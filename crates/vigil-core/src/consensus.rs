// crates/vigil-core/src/consensus.rs

use serde::{Deserialize, Serialize};

use crate::report::ReportStatus;
use crate::Timestamp;

/// The trusted verdict for one target, overwritten on every successful
/// resolution.
///
/// The `Default` value is the "no consensus yet" sentinel (`is_valid = false`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    /// Winning status.
    pub status: ReportStatus,
    /// Truncated mean response time of the window, in milliseconds.
    pub average_response_time: u64,
    /// Engine time of the resolution (Unix seconds).
    pub resolved_at: Timestamp,
    /// Online + Offline + Degraded votes counted in the window.
    pub vote_count: u64,
    /// True only when the quorum and the share threshold were both met.
    pub is_valid: bool,
}

impl Default for ConsensusRecord {
    fn default() -> Self {
        Self {
            status: ReportStatus::Unknown,
            average_response_time: 0,
            resolved_at: 0,
            vote_count: 0,
            is_valid: false,
        }
    }
}
