// crates/vigil-daemon/src/lib.rs
//
// vigil-daemon: Runtime for the Vigil engine.
//
// Wires the report log, consensus resolver, reputation ledger, and reward
// ledger into one `VigilEngine` that serializes work per target, publishes
// engine events on a broadcast channel, and can be driven from a JSON-lines
// command stream (deterministic replay or live stdin).

pub mod config;
pub mod engine;
pub mod locks;
pub mod replay;

pub use config::{DaemonConfig, StoreBackend};
pub use engine::{EngineSummary, Submission, VigilEngine};
pub use locks::KeyedLocks;
pub use replay::{require_empty_log, Command, Replayer};
