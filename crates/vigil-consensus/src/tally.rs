// crates/vigil-consensus/src/tally.rs
//
// Pure vote aggregation over a report window.
//
// Everything here is integer arithmetic with truncating division, evaluated
// in a fixed order, so a resolution can be replayed exactly from the same
// reports, parameters, and evaluation instant.

use serde::{Deserialize, Serialize};

use vigil_core::{NodeId, Report, ReportStatus, Timestamp, VigilError};

/// Aggregate of the in-window reports of one target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowTally {
    pub online: u64,
    pub offline: u64,
    pub degraded: u64,
    /// Sum of response times of every in-window report, Unknown included.
    /// Held in `u128` so the sum of a full window is always exact.
    pub total_response_time: u128,
    /// Deduplicated reporting nodes in first-seen order, Unknown included.
    pub contributors: Vec<NodeId>,
}

impl WindowTally {
    /// Votes cast for a status. `Unknown` never has votes.
    pub fn votes_for(&self, status: ReportStatus) -> u64 {
        match status {
            ReportStatus::Online => self.online,
            ReportStatus::Offline => self.offline,
            ReportStatus::Degraded => self.degraded,
            ReportStatus::Unknown => 0,
        }
    }

    /// Online + Offline + Degraded. Unknown reports are not votes.
    pub fn vote_count(&self) -> u64 {
        self.online + self.offline + self.degraded
    }
}

/// A verdict that met both the quorum and the share threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub status: ReportStatus,
    pub winning_votes: u64,
    pub vote_count: u64,
    /// floor(winning_votes * 100 / vote_count).
    pub winning_share: u64,
    /// floor(total_response_time / vote_count).
    pub average_response_time: u64,
}

/// Result of evaluating a tally against the consensus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    Reached(Verdict),
    /// Fewer votes than `min_reports_for_consensus`.
    InsufficientVotes { vote_count: u64, required: u64 },
    /// Quorum met but the winning share fell short of the threshold.
    BelowThreshold {
        vote_count: u64,
        winning_share: u64,
        threshold: u64,
    },
}

/// Tally the reports that fall inside `window` seconds of `now`.
///
/// Every in-window report adds its response time and its node (deduplicated),
/// whatever its status. Only Online, Offline, and Degraded add a vote.
pub fn tally_window(reports: &[Report], now: Timestamp, window: u64) -> WindowTally {
    let mut tally = WindowTally::default();

    for report in reports.iter().filter(|r| r.is_within(now, window)) {
        tally.total_response_time += u128::from(report.response_time);
        if !tally.contributors.contains(&report.node_id) {
            tally.contributors.push(report.node_id);
        }
        match report.status {
            ReportStatus::Online => tally.online += 1,
            ReportStatus::Offline => tally.offline += 1,
            ReportStatus::Degraded => tally.degraded += 1,
            ReportStatus::Unknown => {}
        }
    }

    tally
}

/// Pick the majority status and its vote count.
///
/// Buckets are scanned Online, Offline, Degraded; a bucket only takes over
/// with a strictly greater count, so ties go to the earlier status. With no
/// votes at all the result is `(Unknown, 0)`.
pub fn select_majority(tally: &WindowTally) -> (ReportStatus, u64) {
    let mut winner = ReportStatus::Unknown;
    let mut max_count = 0;
    for status in ReportStatus::VOTING {
        let count = tally.votes_for(status);
        if count > max_count {
            winner = status;
            max_count = count;
        }
    }
    (winner, max_count)
}

/// Decide whether a tally reaches consensus.
///
/// Requires `vote_count >= min_reports` and
/// `floor(max_count * 100 / vote_count) >= threshold`. The average response
/// time divides the full response-time sum (which may include Unknown
/// reports) by `vote_count` (which never does).
///
/// # Errors
/// Returns `VigilError::InvalidReport` if that average does not fit a `u64`,
/// which takes Unknown reports with response times near `u64::MAX`.
pub fn evaluate(
    tally: &WindowTally,
    min_reports: u64,
    threshold: u64,
) -> Result<Evaluation, VigilError> {
    let vote_count = tally.vote_count();
    if vote_count == 0 || vote_count < min_reports {
        return Ok(Evaluation::InsufficientVotes {
            vote_count,
            required: min_reports,
        });
    }

    let (status, winning_votes) = select_majority(tally);
    let winning_share = winning_votes * 100 / vote_count;
    if winning_share < threshold {
        return Ok(Evaluation::BelowThreshold {
            vote_count,
            winning_share,
            threshold,
        });
    }

    let average = tally.total_response_time / u128::from(vote_count);
    let average_response_time = u64::try_from(average).map_err(|_| {
        VigilError::InvalidReport(format!(
            "average response time {} exceeds the representable range",
            average
        ))
    })?;

    Ok(Evaluation::Reached(Verdict {
        status,
        winning_votes,
        vote_count,
        winning_share,
        average_response_time,
    }))
}

/// Compare each contributor's report with the winning status.
///
/// For every contributor, the first report (oldest first) from that node in
/// `recent` that is still inside the window decides the outcome. Contributors
/// without such a report are skipped.
pub fn agreement_outcomes(
    recent: &[Report],
    contributors: &[NodeId],
    winning: ReportStatus,
    now: Timestamp,
    window: u64,
) -> Vec<(NodeId, bool)> {
    contributors
        .iter()
        .filter_map(|node_id| {
            recent
                .iter()
                .find(|r| r.node_id == *node_id && r.is_within(now, window))
                .map(|r| (*node_id, r.status == winning))
        })
        .collect()
}
