// crates/vigil-daemon/src/engine.rs
//
// VigilEngine: the single entry point collaborators talk to.
//
// Report submission (append + resolve) and settlement both take the target's
// lock, so work on one target is fully serialized while different targets
// proceed in parallel. Results are published as `EngineEvent`s on a tokio
// broadcast channel; emitting with no subscribers is not an error.
//
// With a state store attached, every published round, updated reputation
// entry, credited balance, and settlement guard is saved as it changes and
// reloaded on startup.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};

use vigil_consensus::{ConsensusBook, ConsensusResolver, Resolution, ResolutionOutcome};
use vigil_core::{
    Amount, Clock, ConsensusRecord, ConsensusView, EngineConfig, EngineEvent, NodeId,
    PayoutResolver, Report, ReportId, ReportLog, ReputationEntry, StateStore, StoredRound,
    TargetId, Timestamp, VigilError,
};
use vigil_economics::{RewardLedger, SelfPayout, Settlement};
use vigil_reputation::ReputationLedger;

use crate::locks::KeyedLocks;

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1024;

/// Result of submitting one report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub report_id: ReportId,
    pub outcome: ResolutionOutcome,
    /// Present when auto-settle paid the round this report completed.
    pub settlement: Option<Settlement>,
}

/// Point-in-time view of every store, for operators and replay output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSummary {
    pub reports: u64,
    pub consensus: Vec<(TargetId, ConsensusRecord, Vec<NodeId>)>,
    pub reputation: Vec<(NodeId, ReputationEntry)>,
    pub balances: Vec<(NodeId, Amount)>,
    pub settled: Vec<(TargetId, Timestamp)>,
}

/// Consensus-and-incentive engine.
pub struct VigilEngine {
    log: Arc<dyn ReportLog>,
    resolver: ConsensusResolver,
    book: Arc<ConsensusBook>,
    reputation: Arc<ReputationLedger>,
    rewards: RewardLedger,
    payout: Arc<dyn PayoutResolver>,
    config: RwLock<EngineConfig>,
    clock: Arc<dyn Clock>,
    locks: KeyedLocks<TargetId>,
    events: broadcast::Sender<EngineEvent>,
    settle_on_consensus: bool,
    state: Option<Arc<dyn StateStore>>,
    /// Serializes snapshot-and-save, so the last save of a shared node
    /// always carries its latest value.
    persist: Mutex<()>,
}

impl VigilEngine {
    /// Create an engine over `log` with a validated configuration.
    ///
    /// # Errors
    /// Returns `VigilError::Configuration` if `config` is invalid.
    pub fn new(
        log: Arc<dyn ReportLog>,
        config: EngineConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, VigilError> {
        config.validate()?;
        let book = Arc::new(ConsensusBook::new());
        let reputation = Arc::new(ReputationLedger::new());
        let resolver = ConsensusResolver::new(log.clone(), book.clone(), reputation.clone());
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER);

        Ok(Self {
            log,
            resolver,
            book,
            reputation,
            rewards: RewardLedger::new(),
            payout: Arc::new(SelfPayout),
            config: RwLock::new(config),
            clock,
            locks: KeyedLocks::new(),
            events,
            settle_on_consensus: false,
            state: None,
            persist: Mutex::new(()),
        })
    }

    /// Load saved state from `store` and keep saving into it.
    ///
    /// Call before the engine handles any request.
    pub fn with_state_store(mut self, store: Arc<dyn StateStore>) -> Result<Self, VigilError> {
        let state = store.load_state()?;
        tracing::info!(
            "Restoring {} rounds, {} reputation entries, {} balances, {} settled targets",
            state.rounds.len(),
            state.reputation.len(),
            state.balances.len(),
            state.settled.len()
        );
        for round in state.rounds {
            self.book.publish(round.target_id, round.record, round.contributors);
        }
        for (node_id, entry) in state.reputation {
            self.reputation.restore(node_id, entry);
        }
        for (recipient, amount) in state.balances {
            self.rewards.restore_balance(recipient, amount);
        }
        for (target_id, resolved_at) in state.settled {
            self.rewards.restore_settled(target_id, resolved_at);
        }
        self.state = Some(store);
        Ok(self)
    }

    /// Route payouts through a custom recipient resolver.
    pub fn with_payout_resolver(mut self, payout: Arc<dyn PayoutResolver>) -> Self {
        self.payout = payout;
        self
    }

    /// Resize the event channel. Existing subscribers are dropped.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        self.events = events;
        self
    }

    /// Settle every freshly reached round inside the same target lock, so
    /// the paid contributor set is exactly the one just announced.
    pub fn with_settle_on_consensus(mut self, enabled: bool) -> Self {
        self.settle_on_consensus = enabled;
        self
    }

    /// Subscribe to consensus and settlement events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Current engine time.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Snapshot of the current configuration.
    pub async fn config(&self) -> EngineConfig {
        self.config.read().await.clone()
    }

    /// Replace the configuration. Operations already running keep the
    /// snapshot they started with.
    ///
    /// # Errors
    /// Returns `VigilError::Configuration` and keeps the old configuration if
    /// `config` is invalid.
    pub async fn update_config(&self, config: EngineConfig) -> Result<(), VigilError> {
        config.validate()?;
        *self.config.write().await = config;
        tracing::info!("Engine configuration updated");
        Ok(())
    }

    /// Append a report and re-evaluate its target.
    pub async fn submit_report(&self, report: Report) -> Result<Submission, VigilError> {
        let target_id = report.target_id;
        let _guard = self.locks.lock(target_id).await;
        let config = self.config().await;

        let report_id = self.log.append(report)?;
        let now = self.clock.now();
        let outcome = self.resolver.resolve(target_id, &config, now)?;

        let mut settlement = None;
        if let ResolutionOutcome::Resolved(resolution) = &outcome {
            self.persist_resolution(resolution).await?;
            self.emit(EngineEvent::ConsensusReached {
                target_id,
                status: resolution.record.status,
                average_response_time: resolution.record.average_response_time,
                vote_count: resolution.record.vote_count,
                resolved_at: resolution.record.resolved_at,
                contributors: resolution.contributors.clone(),
            });
            if self.settle_on_consensus {
                settlement = match self.settle_locked(target_id, &config).await {
                    Ok(settlement) => Some(settlement),
                    Err(e @ VigilError::Storage(_)) => return Err(e),
                    Err(_) => None,
                };
            }
        }

        Ok(Submission {
            report_id,
            outcome,
            settlement,
        })
    }

    /// Pay out the target's current consensus round.
    ///
    /// Settlement reads the contributor set as it is now: if the target was
    /// re-resolved after the round a caller was notified about, the newer
    /// round's contributors are paid.
    pub async fn settle(&self, target_id: TargetId) -> Result<Settlement, VigilError> {
        let _guard = self.locks.lock(target_id).await;
        let config = self.config().await;
        self.settle_locked(target_id, &config).await
    }

    async fn settle_locked(
        &self,
        target_id: TargetId,
        config: &EngineConfig,
    ) -> Result<Settlement, VigilError> {
        let settlement = match self.rewards.settle(
            target_id,
            self.book.as_ref(),
            self.reputation.as_ref(),
            self.payout.as_ref(),
            config,
        ) {
            Ok(settlement) => settlement,
            Err(e) => {
                tracing::warn!("Settlement of target {} rejected: {}", target_id, e);
                return Err(e);
            }
        };

        self.persist_settlement(&settlement).await?;

        for payout in &settlement.payouts {
            self.emit(EngineEvent::RewardPaid {
                target_id,
                node_id: payout.node_id,
                recipient: payout.recipient,
                amount: payout.amount,
                resolved_at: settlement.resolved_at,
            });
        }
        self.emit(EngineEvent::RoundSettled {
            target_id,
            resolved_at: settlement.resolved_at,
            total: settlement.total,
            paid_nodes: settlement.payouts.len(),
        });

        Ok(settlement)
    }

    /// Current consensus record (invalid sentinel if never resolved).
    pub fn get_consensus(&self, target_id: TargetId) -> ConsensusRecord {
        self.book.consensus(target_id)
    }

    /// Contributor set of the target's latest round.
    pub fn get_contributors(&self, target_id: TargetId) -> Vec<NodeId> {
        self.book.contributors(target_id)
    }

    /// Reputation entry of a node.
    ///
    /// # Errors
    /// Returns `VigilError::NotFound` for a node no resolution has touched.
    pub fn get_reputation(&self, node_id: NodeId) -> Result<ReputationEntry, VigilError> {
        self.reputation.get(node_id)
    }

    /// Cumulative reward balance of a recipient.
    pub fn get_reward_balance(&self, recipient: NodeId) -> Amount {
        self.rewards.balance_of(recipient)
    }

    /// `resolved_at` of the last settled round of a target.
    pub fn last_settled_at(&self, target_id: TargetId) -> Option<Timestamp> {
        self.rewards.last_settled_at(target_id)
    }

    /// Fetch a stored report.
    pub fn get_report(&self, report_id: ReportId) -> Result<Report, VigilError> {
        self.log.get(report_id)
    }

    /// Point-in-time view of all stores.
    pub fn summary(&self) -> Result<EngineSummary, VigilError> {
        let consensus = self
            .book
            .targets()
            .into_iter()
            .map(|t| (t, self.book.consensus(t), self.book.contributors(t)))
            .collect();
        Ok(EngineSummary {
            reports: self.log.len()?,
            consensus,
            reputation: self.reputation.snapshot(),
            balances: self.rewards.balances(),
            settled: self.rewards.settled(),
        })
    }

    async fn persist_resolution(&self, resolution: &Resolution) -> Result<(), VigilError> {
        let Some(store) = &self.state else {
            return Ok(());
        };
        let _persist = self.persist.lock().await;
        let reputation = resolution
            .outcomes
            .iter()
            .map(|(node_id, _)| -> Result<(NodeId, ReputationEntry), VigilError> {
                Ok((*node_id, self.reputation.get(*node_id)?))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let round = StoredRound {
            target_id: resolution.target_id,
            record: resolution.record.clone(),
            contributors: resolution.contributors.clone(),
        };
        store.save_resolution(&round, &reputation).map_err(|e| {
            tracing::error!("Failed to save round of target {}: {}", round.target_id, e);
            e
        })
    }

    async fn persist_settlement(&self, settlement: &Settlement) -> Result<(), VigilError> {
        let Some(store) = &self.state else {
            return Ok(());
        };
        let _persist = self.persist.lock().await;
        let mut recipients: Vec<NodeId> = settlement.payouts.iter().map(|p| p.recipient).collect();
        recipients.sort_unstable();
        recipients.dedup();
        let balances: Vec<(NodeId, Amount)> = recipients
            .into_iter()
            .map(|recipient| (recipient, self.rewards.balance_of(recipient)))
            .collect();
        store
            .save_settlement(settlement.target_id, settlement.resolved_at, &balances)
            .map_err(|e| {
                tracing::error!(
                    "Failed to save settlement of target {}: {}",
                    settlement.target_id,
                    e
                );
                e
            })
    }

    fn emit(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{ManualClock, ReportStatus};
    use vigil_store::InMemoryReportLog;

    fn engine(clock: Arc<ManualClock>) -> VigilEngine {
        let config = EngineConfig {
            min_reports_for_consensus: 3,
            consensus_threshold: 60,
            ..EngineConfig::default()
        };
        VigilEngine::new(Arc::new(InMemoryReportLog::new()), config, clock).unwrap()
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = EngineConfig {
            consensus_threshold: 150,
            ..EngineConfig::default()
        };
        let result = VigilEngine::new(
            Arc::new(InMemoryReportLog::new()),
            config,
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(VigilError::Configuration(_))));
    }

    #[tokio::test]
    async fn update_config_validates() {
        let engine = engine(Arc::new(ManualClock::new(1_000)));
        let bad = EngineConfig {
            min_reports_for_consensus: 0,
            ..EngineConfig::default()
        };
        assert!(engine.update_config(bad).await.is_err());
        assert_eq!(engine.config().await.min_reports_for_consensus, 3);

        let good = EngineConfig {
            min_reports_for_consensus: 2,
            ..EngineConfig::default()
        };
        engine.update_config(good).await.unwrap();
        assert_eq!(engine.config().await.min_reports_for_consensus, 2);
    }

    #[tokio::test]
    async fn consensus_event_is_broadcast() {
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = engine(clock.clone());
        let mut rx = engine.subscribe();

        for node in 1..=3 {
            engine
                .submit_report(Report::new(9, node, ReportStatus::Degraded, 500, 995))
                .await
                .unwrap();
        }

        match rx.try_recv().unwrap() {
            EngineEvent::ConsensusReached {
                target_id,
                status,
                vote_count,
                resolved_at,
                contributors,
                ..
            } => {
                assert_eq!(target_id, 9);
                assert_eq!(status, ReportStatus::Degraded);
                assert_eq!(vote_count, 3);
                assert_eq!(resolved_at, 1_000);
                assert_eq!(contributors, vec![1, 2, 3]);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn settlement_emits_per_node_and_total_events() {
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = engine(clock.clone());
        for node in 1..=3 {
            engine
                .submit_report(Report::new(9, node, ReportStatus::Online, 100, 999))
                .await
                .unwrap();
        }
        let mut rx = engine.subscribe();
        let settlement = engine.settle(9).await.unwrap();
        assert_eq!(settlement.payouts.len(), 3);

        let mut paid = 0;
        let mut total = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                EngineEvent::RewardPaid { .. } => paid += 1,
                EngineEvent::RoundSettled { total: t, .. } => total = Some(t),
                other => panic!("unexpected event {:?}", other),
            }
        }
        assert_eq!(paid, 3);
        assert_eq!(total, Some(settlement.total));
    }

    #[tokio::test]
    async fn summary_lists_all_stores() {
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = engine(clock);
        for node in 1..=3 {
            engine
                .submit_report(Report::new(4, node, ReportStatus::Online, 90, 1_000))
                .await
                .unwrap();
        }
        engine.settle(4).await.unwrap();
        let summary = engine.summary().unwrap();
        assert_eq!(summary.reports, 3);
        assert_eq!(summary.consensus.len(), 1);
        assert_eq!(summary.reputation.len(), 3);
        assert_eq!(summary.balances.len(), 3);
    }

    #[tokio::test]
    async fn auto_settle_pays_the_announced_round() {
        let clock = Arc::new(ManualClock::new(1_000));
        let engine = engine(clock).with_settle_on_consensus(true);

        let first = engine
            .submit_report(Report::new(2, 1, ReportStatus::Online, 100, 1_000))
            .await
            .unwrap();
        assert!(first.settlement.is_none());
        engine
            .submit_report(Report::new(2, 2, ReportStatus::Online, 100, 1_000))
            .await
            .unwrap();
        let third = engine
            .submit_report(Report::new(2, 3, ReportStatus::Online, 100, 1_000))
            .await
            .unwrap();

        let settlement = third.settlement.expect("round should be auto-settled");
        assert_eq!(settlement.resolved_at, 1_000);
        assert_eq!(settlement.payouts.len(), 3);
        assert_eq!(engine.last_settled_at(2), Some(1_000));
        // A manual settle of the same round is a duplicate.
        assert!(matches!(
            engine.settle(2).await,
            Err(VigilError::InvalidState(_))
        ));
    }

    /// State store keeping the latest saved value per key, like a KV store.
    #[derive(Default)]
    struct SavedState {
        rounds: std::sync::Mutex<std::collections::BTreeMap<TargetId, StoredRound>>,
        reputation: std::sync::Mutex<std::collections::BTreeMap<NodeId, ReputationEntry>>,
        balances: std::sync::Mutex<std::collections::BTreeMap<NodeId, Amount>>,
        settled: std::sync::Mutex<std::collections::BTreeMap<TargetId, Timestamp>>,
    }

    impl StateStore for SavedState {
        fn save_resolution(
            &self,
            round: &StoredRound,
            reputation: &[(NodeId, ReputationEntry)],
        ) -> Result<(), VigilError> {
            self.rounds.lock().unwrap().insert(round.target_id, round.clone());
            let mut entries = self.reputation.lock().unwrap();
            for (node_id, entry) in reputation {
                entries.insert(*node_id, entry.clone());
            }
            Ok(())
        }

        fn save_settlement(
            &self,
            target_id: TargetId,
            resolved_at: Timestamp,
            balances: &[(NodeId, Amount)],
        ) -> Result<(), VigilError> {
            self.settled.lock().unwrap().insert(target_id, resolved_at);
            self.balances.lock().unwrap().extend(balances.iter().copied());
            Ok(())
        }

        fn load_state(&self) -> Result<vigil_core::EngineState, VigilError> {
            Ok(vigil_core::EngineState {
                rounds: self.rounds.lock().unwrap().values().cloned().collect(),
                reputation: self
                    .reputation
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(n, e)| (*n, e.clone()))
                    .collect(),
                balances: self.balances.lock().unwrap().iter().map(|(n, a)| (*n, *a)).collect(),
                settled: self.settled.lock().unwrap().iter().map(|(t, r)| (*t, *r)).collect(),
            })
        }
    }

    #[tokio::test]
    async fn restarted_engine_resumes_saved_state() {
        let log = Arc::new(InMemoryReportLog::new());
        let saved = Arc::new(SavedState::default());
        let config = EngineConfig {
            consensus_threshold: 60,
            ..EngineConfig::default()
        };

        {
            let clock = Arc::new(ManualClock::new(1_000));
            let engine = VigilEngine::new(log.clone(), config.clone(), clock)
                .unwrap()
                .with_state_store(saved.clone())
                .unwrap();
            for node in 1..=3 {
                engine
                    .submit_report(Report::new(1, node, ReportStatus::Online, 100, 1_000))
                    .await
                    .unwrap();
            }
            engine.settle(1).await.unwrap();
            assert_eq!(engine.get_reward_balance(1), 100);
        }

        let engine = VigilEngine::new(log, config, Arc::new(ManualClock::new(1_001)))
            .unwrap()
            .with_state_store(saved)
            .unwrap();
        assert_eq!(engine.get_reward_balance(1), 100);
        assert_eq!(engine.get_reputation(1).unwrap().score, 51);
        assert!(engine.get_consensus(1).is_valid);
        assert_eq!(engine.get_contributors(1), vec![1, 2, 3]);
        assert_eq!(engine.last_settled_at(1), Some(1_000));
        assert!(matches!(
            engine.settle(1).await,
            Err(VigilError::InvalidState(_))
        ));

        // The next round builds on the restored scores and balances.
        engine
            .submit_report(Report::new(1, 4, ReportStatus::Online, 100, 1_001))
            .await
            .unwrap();
        assert_eq!(engine.get_reputation(1).unwrap().score, 52);
        engine.settle(1).await.unwrap();
        // 100 from before the restart, then 52 -> adjusted 1 -> 101.
        assert_eq!(engine.get_reward_balance(1), 201);
        assert_eq!(engine.summary().unwrap().settled, vec![(1, 1_001)]);
    }
}
