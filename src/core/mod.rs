//! Core types, constants, configuration, and errors.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{Config, IfaceConfig, LocalRoute};
pub use error::{ConfigError, EigrpError, MalformedPacket, ProtocolMismatch, TransportError};
pub use types::{seq_newer, AsNumber, IfaceIndex, NeighborId, Prefix, RouterId};
