// crates/vigil-economics/src/lib.rs
//
// vigil-economics: Reputation-weighted rewards and round settlement for the
// Vigil engine.
//
// A finalized consensus round pays every eligible contributor a base reward
// scaled up or down by how far its reputation sits from neutral (50).
// Settlement is idempotent per round: a round is paid at most once.

pub mod payout;
pub mod rewards;
pub mod settlement;

// Re-export key types for ergonomic access from downstream crates.
pub use payout::{MappedPayout, SelfPayout};
pub use rewards::{compute_reward, NEUTRAL_REPUTATION};
pub use settlement::{Payout, RewardLedger, Settlement};
