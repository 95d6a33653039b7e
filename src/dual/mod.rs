//! The diffusing update algorithm.
//!
//! Split into the composite metric arithmetic, the topology table, the
//! per-destination Passive/Active state machine, and the engine that
//! wires them to route adverts and neighbor events.

mod engine;
mod fsm;
mod metric;
mod topology;

pub use engine::{DualEngine, RouteAdvert};
pub use fsm::{Action, DualState, QueryOrigin};
pub use metric::{add_link_cost, composite};
pub use topology::{LocalPath, PathInfo, TopologyEntry, TopologyTable};
