// crates/vigil-daemon/src/replay.rs
//
// JSON-lines command stream driving a VigilEngine.
//
// One command per line, tagged by "op":
//   {"op":"advance_clock","to":1000}
//   {"op":"report","target_id":1,"node_id":2,"status":1,"response_time":120}
//   {"op":"settle","target_id":1}
//   {"op":"configure","config":{"consensus_threshold":60}}
// Blank lines and lines starting with '#' are skipped. Every engine event
// produced by a command is written back as one JSON line.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::TryRecvError};

use vigil_core::{
    EngineConfig, EngineEvent, ManualClock, NodeId, Report, ReportLog, ReportStatus, TargetId,
    Timestamp, VigilError,
};

use crate::engine::VigilEngine;

/// A single replayable operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    /// Move the manual clock forward to `to`.
    AdvanceClock { to: Timestamp },
    /// Submit a report. `status` is the wire code (0-3); `observed_at`
    /// defaults to the engine's current time.
    Report {
        target_id: TargetId,
        node_id: NodeId,
        status: u8,
        response_time: u64,
        #[serde(default)]
        observed_at: Option<Timestamp>,
        #[serde(default)]
        message: String,
    },
    /// Settle the target's current round.
    Settle { target_id: TargetId },
    /// Replace the engine configuration.
    Configure { config: EngineConfig },
}

/// Refuse to replay over a log that already holds reports.
///
/// A replay drives a fresh manual clock, so stored reports and rounds from an
/// earlier run would make its output depend on more than the command file.
pub fn require_empty_log(log: &dyn ReportLog) -> Result<(), VigilError> {
    let stored = log.len()?;
    if stored > 0 {
        return Err(VigilError::Configuration(format!(
            "replay needs an empty report log, found {} reports",
            stored
        )));
    }
    Ok(())
}

/// Applies commands to an engine and collects the events they produce.
pub struct Replayer {
    engine: Arc<VigilEngine>,
    clock: Option<Arc<ManualClock>>,
    events: broadcast::Receiver<EngineEvent>,
    applied: u64,
    rejected: u64,
}

impl Replayer {
    /// `clock` must be the engine's clock for `advance_clock` to work; with
    /// `None` (live mode) those commands are rejected.
    pub fn new(engine: Arc<VigilEngine>, clock: Option<Arc<ManualClock>>) -> Self {
        let events = engine.subscribe();
        Self {
            engine,
            clock,
            events,
            applied: 0,
            rejected: 0,
        }
    }

    /// Number of commands applied successfully.
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Number of commands the engine rejected.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Apply one command and return the events it produced.
    pub async fn apply(&mut self, command: Command) -> Result<Vec<EngineEvent>, VigilError> {
        match command {
            Command::AdvanceClock { to } => {
                let clock = self.clock.as_ref().ok_or_else(|| {
                    VigilError::InvalidState("advance_clock requires a manual clock".to_string())
                })?;
                clock.set(to);
            }
            Command::Report {
                target_id,
                node_id,
                status,
                response_time,
                observed_at,
                message,
            } => {
                let status = ReportStatus::try_from(status)?;
                let observed_at = observed_at.unwrap_or_else(|| self.engine.now());
                let report = Report::new(target_id, node_id, status, response_time, observed_at)
                    .with_message(message);
                self.engine.submit_report(report).await?;
            }
            Command::Settle { target_id } => {
                self.engine.settle(target_id).await?;
            }
            Command::Configure { config } => {
                self.engine.update_config(config).await?;
            }
        }
        Ok(self.drain())
    }

    /// Parse and apply one line. Blank and comment lines yield no events.
    pub async fn apply_line(&mut self, line: &str) -> Result<Vec<EngineEvent>, VigilError> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(Vec::new());
        }
        let command: Command = serde_json::from_str(line)?;
        self.apply(command).await
    }

    /// Run a whole command stream, writing each event as a JSON line to `out`.
    ///
    /// With `strict`, a malformed line aborts the run; otherwise it is logged
    /// and skipped. Engine rejections (duplicate settlement, bad config, ...)
    /// are logged and counted, never fatal. Storage failures always abort.
    pub async fn run<R, W>(
        &mut self,
        reader: R,
        out: &mut W,
        strict: bool,
    ) -> Result<(), VigilError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        let mut line_no = 0u64;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| VigilError::Storage(e.to_string()))?
        {
            line_no += 1;
            match self.apply_line(&line).await {
                Ok(events) => {
                    if !line.trim().is_empty() && !line.trim().starts_with('#') {
                        self.applied += 1;
                    }
                    for event in events {
                        tracing::debug!(
                            "Line {}: event for target {}",
                            line_no,
                            event.target_id()
                        );
                        let mut json = serde_json::to_string(&event)?;
                        json.push('\n');
                        out.write_all(json.as_bytes())
                            .await
                            .map_err(|e| VigilError::Storage(e.to_string()))?;
                    }
                }
                Err(VigilError::Serialization(e)) if !strict => {
                    tracing::warn!("Line {}: skipping malformed command: {}", line_no, e);
                }
                Err(VigilError::Serialization(e)) => {
                    return Err(VigilError::Serialization(format!("line {}: {}", line_no, e)));
                }
                Err(e @ VigilError::Storage(_)) => return Err(e),
                Err(e) => {
                    self.rejected += 1;
                    tracing::warn!("Line {}: command rejected: {}", line_no, e);
                }
            }
        }
        out.flush()
            .await
            .map_err(|e| VigilError::Storage(e.to_string()))?;
        Ok(())
    }

    fn drain(&mut self) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!("Event stream lagged, {} events dropped", missed);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        events
    }
}
