// crates/vigil-core/src/report.rs
//
// Observation reports submitted by probing nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::VigilError;
use crate::{NodeId, TargetId, Timestamp};

/// Operational status a node observed for a target.
///
/// Wire codes are stable: Unknown=0, Online=1, Offline=2, Degraded=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// The node could not determine a status. Never counted as a vote.
    Unknown,
    Online,
    Offline,
    Degraded,
}

impl ReportStatus {
    /// The statuses that carry a vote, in majority scan order.
    pub const VOTING: [ReportStatus; 3] = [
        ReportStatus::Online,
        ReportStatus::Offline,
        ReportStatus::Degraded,
    ];

    /// Stable numeric code of this status.
    pub fn code(self) -> u8 {
        match self {
            ReportStatus::Unknown => 0,
            ReportStatus::Online => 1,
            ReportStatus::Offline => 2,
            ReportStatus::Degraded => 3,
        }
    }
}

impl TryFrom<u8> for ReportStatus {
    type Error = VigilError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ReportStatus::Unknown),
            1 => Ok(ReportStatus::Online),
            2 => Ok(ReportStatus::Offline),
            3 => Ok(ReportStatus::Degraded),
            other => Err(VigilError::InvalidReport(format!(
                "unrecognised status code {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Unknown => write!(f, "Unknown"),
            ReportStatus::Online => write!(f, "Online"),
            ReportStatus::Offline => write!(f, "Offline"),
            ReportStatus::Degraded => write!(f, "Degraded"),
        }
    }
}

/// One node's timestamped observation of one target.
///
/// Immutable once appended to the report log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// The monitored target.
    pub target_id: TargetId,
    /// The reporting node.
    pub node_id: NodeId,
    /// Observed status.
    pub status: ReportStatus,
    /// Observed response time in milliseconds.
    pub response_time: u64,
    /// When the observation was made (Unix seconds).
    pub observed_at: Timestamp,
    /// Free-form check message.
    #[serde(default)]
    pub message: String,
}

impl Report {
    /// Build a report with an empty message.
    pub fn new(
        target_id: TargetId,
        node_id: NodeId,
        status: ReportStatus,
        response_time: u64,
        observed_at: Timestamp,
    ) -> Self {
        Self {
            target_id,
            node_id,
            status,
            response_time,
            observed_at,
            message: String::new(),
        }
    }

    /// Attach a check message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Whether this report is inside `window` seconds of `now`.
    ///
    /// A report stamped after `now` has age zero and counts as in-window.
    pub fn is_within(&self, now: Timestamp, window: u64) -> bool {
        now.saturating_sub(self.observed_at) <= window
    }
}
