//! Neighbor discovery and session tracking.
//!
//! Neighbors are learned from Hellos, brought up through an INIT-flagged
//! Update exchange, kept alive by the hold timer, and torn down when it
//! expires. The table here owns all per-neighbor session state; routing
//! state lives in the DUAL engine and refers to neighbors by id.

mod manager;
mod neighbor;

pub use manager::{hello_parameters, HelloOutcome, NeighborManager};
pub use neighbor::{Neighbor, SessionState};
