// crates/vigil-core/src/clock.rs
//
// Time sources for resolution and reputation timestamps.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::Timestamp;

/// Source of the engine's notion of "now".
pub trait Clock: Send + Sync {
    /// Current time in Unix seconds.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time via chrono.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now().timestamp().max(0) as Timestamp
    }
}

/// A clock that only moves when told to. Used by tests and deterministic replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, to: Timestamp) {
        self.now.fetch_max(to, Ordering::SeqCst);
    }

    /// Move forward by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}
