//! Process instance and event loop.

mod instance;
mod timers;

#[cfg(feature = "runtime")]
#[cfg_attr(docsrs, doc(cfg(feature = "runtime")))]
mod runtime;

pub use instance::Router;
pub use timers::TimerQueue;

#[cfg(feature = "runtime")]
pub use runtime::{run, DEFAULT_PORT};
