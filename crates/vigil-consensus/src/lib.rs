// crates/vigil-consensus/src/lib.rs
//
// vigil-consensus: Windowed majority-vote consensus for the Vigil engine.
//
// On every new report the resolver inspects the target's most recent window,
// tallies votes per status, picks a majority with a fixed tie-break order,
// publishes the verdict and its contributor set, and feeds each
// contributor's agreement back into the reputation ledger.

pub mod book;
pub mod resolver;
pub mod tally;

pub use book::{ConsensusBook, Round};
pub use resolver::{ConsensusResolver, Resolution, ResolutionOutcome};
pub use tally::{
    agreement_outcomes, evaluate, select_majority, tally_window, Evaluation, Verdict, WindowTally,
};
