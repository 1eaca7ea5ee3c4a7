// crates/vigil-core/src/lib.rs
//
// vigil-core: Core types, errors, configuration, and collaborator traits for
// the Vigil uptime-consensus engine.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines reports, consensus records, reputation entries, engine events,
// and the trait seams between the report log, the consensus resolver, the
// reputation ledger, and the reward engine.

pub mod clock;
pub mod config;
pub mod consensus;
pub mod error;
pub mod events;
pub mod report;
pub mod reputation;
pub mod state;
pub mod traits;

/// Opaque identifier of a monitored target (e.g. a website).
pub type TargetId = u64;

/// Opaque identifier of a reporting node.
pub type NodeId = u64;

/// Dense, zero-based identifier assigned by the report log in append order.
pub type ReportId = u64;

/// Unix time in seconds.
pub type Timestamp = u64;

/// Reward amount in the smallest accounting unit.
pub type Amount = u64;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use vigil_core::Report;`

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, CONSENSUS_WINDOW_SIZE};
pub use consensus::ConsensusRecord;
pub use error::VigilError;
pub use events::EngineEvent;
pub use report::{Report, ReportStatus};
pub use reputation::{ReputationEntry, INITIAL_REPUTATION, MAX_REPUTATION};
pub use state::{EngineState, StoredRound};
pub use traits::{ConsensusView, PayoutResolver, ReportLog, ReputationView, StateStore};
