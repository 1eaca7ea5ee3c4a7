// crates/vigil-consensus/src/resolver.rs
//
// Consensus resolution for one target, triggered by each appended report.
//
// Steps:
// 1. Fetch the target's last CONSENSUS_WINDOW_SIZE reports; stop if fewer
//    than the configured minimum exist
// 2. Tally the in-window reports (votes, response time, contributors)
// 3. Evaluate quorum and share threshold
// 4. Compute every contributor's agreement outcome
// 5. Publish record + contributor set, then apply reputation outcomes
//
// Nothing is mutated until steps 1-4 have succeeded. Callers serialize
// resolutions of the same target; different targets may resolve in parallel.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use vigil_core::{
    ConsensusRecord, EngineConfig, NodeId, Report, ReportLog, TargetId, Timestamp, VigilError,
    CONSENSUS_WINDOW_SIZE,
};
use vigil_reputation::{Outcome, ReputationLedger};

use crate::book::ConsensusBook;
use crate::tally::{agreement_outcomes, evaluate, tally_window, Evaluation};

/// A successful resolution and everything it changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub target_id: TargetId,
    pub record: ConsensusRecord,
    pub contributors: Vec<NodeId>,
    /// Agreement outcome applied to each contributor, in contributor order.
    pub outcomes: Vec<(NodeId, Outcome)>,
}

/// What a resolution attempt did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionOutcome {
    /// A verdict was published and reputations were updated.
    Resolved(Resolution),
    /// Not enough reports (or votes) yet. Nothing changed.
    InsufficientData { available: u64, required: u64 },
    /// Enough votes, but no status won a large enough share. Nothing changed.
    BelowThreshold {
        vote_count: u64,
        winning_share: u64,
        threshold: u64,
    },
}

impl ResolutionOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, ResolutionOutcome::Resolved(_))
    }

    pub fn resolution(&self) -> Option<&Resolution> {
        match self {
            ResolutionOutcome::Resolved(resolution) => Some(resolution),
            _ => None,
        }
    }
}

/// Resolves targets against the report log and feeds the reputation ledger.
#[derive(Clone)]
pub struct ConsensusResolver {
    log: Arc<dyn ReportLog>,
    book: Arc<ConsensusBook>,
    ledger: Arc<ReputationLedger>,
}

impl ConsensusResolver {
    pub fn new(
        log: Arc<dyn ReportLog>,
        book: Arc<ConsensusBook>,
        ledger: Arc<ReputationLedger>,
    ) -> Self {
        Self { log, book, ledger }
    }

    /// The per-target state this resolver writes.
    pub fn book(&self) -> &Arc<ConsensusBook> {
        &self.book
    }

    /// The reputation ledger this resolver writes.
    pub fn ledger(&self) -> &Arc<ReputationLedger> {
        &self.ledger
    }

    /// Evaluate the target's recent window at instant `now`.
    ///
    /// # Errors
    /// Storage failures while reading the window, and an average response
    /// time that does not fit a `u64`. Insufficient data and a missed
    /// threshold are reported as outcomes, not errors. Nothing is published
    /// when this returns an error.
    pub fn resolve(
        &self,
        target_id: TargetId,
        config: &EngineConfig,
        now: Timestamp,
    ) -> Result<ResolutionOutcome, VigilError> {
        let required = config.min_reports_for_consensus;

        // Step 1: Recent window, oldest first
        let ids = self.log.recent(target_id, CONSENSUS_WINDOW_SIZE)?;
        if (ids.len() as u64) < required {
            tracing::debug!(
                "Target {}: insufficient data ({} of {} reports)",
                target_id,
                ids.len(),
                required
            );
            return Ok(ResolutionOutcome::InsufficientData {
                available: ids.len() as u64,
                required,
            });
        }
        let recent = ids
            .iter()
            .map(|id| self.log.get(*id))
            .collect::<Result<Vec<Report>, VigilError>>()?;

        // Step 2-3: Tally and evaluate
        let window = config.consensus_time_window;
        let tally = tally_window(&recent, now, window);
        let verdict = match evaluate(&tally, required, config.consensus_threshold)? {
            Evaluation::Reached(verdict) => verdict,
            Evaluation::InsufficientVotes {
                vote_count,
                required,
            } => {
                tracing::debug!(
                    "Target {}: insufficient data ({} of {} in-window votes)",
                    target_id,
                    vote_count,
                    required
                );
                return Ok(ResolutionOutcome::InsufficientData {
                    available: vote_count,
                    required,
                });
            }
            Evaluation::BelowThreshold {
                vote_count,
                winning_share,
                threshold,
            } => {
                tracing::debug!(
                    "Target {}: no consensus ({}% of {} votes, threshold {}%)",
                    target_id,
                    winning_share,
                    vote_count,
                    threshold
                );
                return Ok(ResolutionOutcome::BelowThreshold {
                    vote_count,
                    winning_share,
                    threshold,
                });
            }
        };

        // Step 4: Agreement outcomes, scanned over the unfiltered window
        let outcomes: Vec<(NodeId, Outcome)> =
            agreement_outcomes(&recent, &tally.contributors, verdict.status, now, window)
                .into_iter()
                .map(|(node_id, agreed)| (node_id, Outcome::from(agreed)))
                .collect();

        let record = ConsensusRecord {
            status: verdict.status,
            average_response_time: verdict.average_response_time,
            resolved_at: now,
            vote_count: verdict.vote_count,
            is_valid: true,
        };

        // Step 5: Publish, then feed reputation
        self.book
            .publish(target_id, record.clone(), tally.contributors.clone());
        for (node_id, outcome) in &outcomes {
            self.ledger.apply_outcome(*node_id, *outcome, now);
        }

        tracing::info!(
            "Target {}: consensus {} ({} votes, {}% share, avg {} ms, {} contributors)",
            target_id,
            record.status,
            record.vote_count,
            verdict.winning_share,
            record.average_response_time,
            tally.contributors.len()
        );

        Ok(ResolutionOutcome::Resolved(Resolution {
            target_id,
            record,
            contributors: tally.contributors,
            outcomes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{ConsensusView, ReportStatus, ReputationView};
    use vigil_store::InMemoryReportLog;

    const NOW: Timestamp = 1_000_000;

    fn setup() -> (Arc<InMemoryReportLog>, ConsensusResolver) {
        let log = Arc::new(InMemoryReportLog::new());
        let resolver = ConsensusResolver::new(
            log.clone(),
            Arc::new(ConsensusBook::new()),
            Arc::new(ReputationLedger::new()),
        );
        (log, resolver)
    }

    fn config(min_reports: u64, threshold: u64) -> EngineConfig {
        EngineConfig {
            min_reports_for_consensus: min_reports,
            consensus_threshold: threshold,
            ..EngineConfig::default()
        }
    }

    fn submit(log: &InMemoryReportLog, node: NodeId, status: ReportStatus, rt: u64) {
        log.append(Report::new(1, node, status, rt, NOW - 5)).unwrap();
    }

    #[test]
    fn too_few_reports_is_a_noop() {
        let (log, resolver) = setup();
        submit(&log, 1, ReportStatus::Online, 100);
        submit(&log, 2, ReportStatus::Online, 100);

        let outcome = resolver.resolve(1, &config(3, 60), NOW).unwrap();
        assert_eq!(
            outcome,
            ResolutionOutcome::InsufficientData {
                available: 2,
                required: 3
            }
        );
        assert!(!resolver.book().consensus(1).is_valid);
        assert!(resolver.ledger().is_empty());
    }

    #[test]
    fn stale_reports_do_not_count() {
        let (log, resolver) = setup();
        for node in 1..=3 {
            log.append(Report::new(1, node, ReportStatus::Online, 100, NOW - 301))
                .unwrap();
        }
        let outcome = resolver.resolve(1, &config(3, 60), NOW).unwrap();
        assert_eq!(
            outcome,
            ResolutionOutcome::InsufficientData {
                available: 0,
                required: 3
            }
        );
    }

    #[test]
    fn resolves_and_updates_reputation() {
        let (log, resolver) = setup();
        submit(&log, 1, ReportStatus::Online, 100);
        submit(&log, 2, ReportStatus::Online, 120);
        submit(&log, 3, ReportStatus::Offline, 0);

        let outcome = resolver.resolve(1, &config(3, 60), NOW).unwrap();
        let resolution = outcome.resolution().expect("consensus");
        assert_eq!(resolution.record.status, ReportStatus::Online);
        assert_eq!(resolution.record.vote_count, 3);
        assert_eq!(resolution.record.average_response_time, 73);
        assert_eq!(resolution.record.resolved_at, NOW);
        assert_eq!(resolution.contributors, vec![1, 2, 3]);

        assert_eq!(resolver.ledger().score_of(1), 51);
        assert_eq!(resolver.ledger().score_of(2), 51);
        assert_eq!(resolver.ledger().score_of(3), 48);
        assert_eq!(resolver.book().contributors(1), vec![1, 2, 3]);
    }

    #[test]
    fn below_threshold_leaves_previous_record() {
        let (log, resolver) = setup();
        submit(&log, 1, ReportStatus::Online, 100);
        submit(&log, 2, ReportStatus::Online, 100);
        submit(&log, 3, ReportStatus::Online, 100);
        assert!(resolver.resolve(1, &config(3, 60), NOW).unwrap().is_resolved());

        // Window is now 3 Online, 3 Offline, 3 Degraded -> 33% share.
        for node in 4..=6 {
            submit(&log, node, ReportStatus::Offline, 100);
        }
        for node in 7..=9 {
            submit(&log, node, ReportStatus::Degraded, 100);
        }
        let outcome = resolver.resolve(1, &config(3, 60), NOW + 10).unwrap();
        assert_eq!(
            outcome,
            ResolutionOutcome::BelowThreshold {
                vote_count: 9,
                winning_share: 33,
                threshold: 60
            }
        );
        assert_eq!(resolver.book().consensus(1).resolved_at, NOW);
        assert_eq!(resolver.ledger().score_of(4), 0);
    }

    #[test]
    fn unknown_only_contributor_is_listed_and_penalised() {
        let (log, resolver) = setup();
        submit(&log, 1, ReportStatus::Online, 100);
        submit(&log, 2, ReportStatus::Online, 100);
        submit(&log, 3, ReportStatus::Online, 100);
        submit(&log, 4, ReportStatus::Unknown, 400);

        let outcome = resolver.resolve(1, &config(3, 60), NOW).unwrap();
        let resolution = outcome.resolution().expect("consensus");
        assert_eq!(resolution.contributors, vec![1, 2, 3, 4]);
        // (100 * 3 + 400) / 3 votes
        assert_eq!(resolution.record.average_response_time, 233);
        assert_eq!(resolver.ledger().score_of(4), 48);
    }
}
