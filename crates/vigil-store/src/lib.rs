// crates/vigil-store/src/lib.rs
//
// vigil-store: Report log backends for the Vigil engine.
//
// Provides an in-memory log for tests and ephemeral daemons, and a
// RocksDB-backed log that retains reports across restarts. Both index
// reports by target and by node.

pub mod memory;
pub mod rocks;

pub use memory::InMemoryReportLog;
pub use rocks::RocksReportLog;
