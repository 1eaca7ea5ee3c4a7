// crates/vigil-reputation/src/lib.rs
//
// vigil-reputation: Per-node trust scores for the Vigil engine.
//
// Each node holds one score in [0, 100], created lazily at 50 and moved only
// by the consensus resolver's agreement outcome: +1 for agreeing with the
// verdict, -2 for disagreeing.

pub mod ledger;

pub use ledger::{Outcome, ReputationLedger, AGREEMENT_REWARD, DISAGREEMENT_PENALTY};
