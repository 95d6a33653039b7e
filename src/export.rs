//! Route export boundary.
//!
//! Successor decisions are pushed to an external forwarding table
//! through this trait. Calls are fire-and-forget: an export failure is
//! logged and swallowed, it never feeds back into route computation.

use std::net::Ipv4Addr;

use tracing::{error, info};

use crate::core::error::EigrpError;
use crate::core::types::{IfaceIndex, Prefix};

/// Sink for forwarding-table changes.
pub trait RouteExport {
    /// Install or replace the route for a prefix.
    fn add_route(
        &mut self,
        prefix: Prefix,
        next_hop: Ipv4Addr,
        iface: IfaceIndex,
        distance: u32,
    ) -> Result<(), EigrpError>;

    /// Withdraw the route for a prefix.
    fn remove_route(&mut self, prefix: Prefix) -> Result<(), EigrpError>;
}

/// Logs every change without forwarding anywhere. The default sink for
/// processes running without kernel-table integration.
#[derive(Debug, Default)]
pub struct LogExport;

impl RouteExport for LogExport {
    fn add_route(
        &mut self,
        prefix: Prefix,
        next_hop: Ipv4Addr,
        iface: IfaceIndex,
        distance: u32,
    ) -> Result<(), EigrpError> {
        info!(%prefix, %next_hop, %iface, distance, "route installed");
        Ok(())
    }

    fn remove_route(&mut self, prefix: Prefix) -> Result<(), EigrpError> {
        info!(%prefix, "route withdrawn");
        Ok(())
    }
}

/// Apply an export call, downgrading any error to a log line.
pub fn export_add(
    sink: &mut dyn RouteExport,
    prefix: Prefix,
    next_hop: Ipv4Addr,
    iface: IfaceIndex,
    distance: u32,
) {
    if let Err(err) = sink.add_route(prefix, next_hop, iface, distance) {
        error!(%prefix, %err, "route export failed");
    }
}

/// Apply a withdrawal, downgrading any error to a log line.
pub fn export_remove(sink: &mut dyn RouteExport, prefix: Prefix) {
    if let Err(err) = sink.remove_route(prefix) {
        error!(%prefix, %err, "route withdrawal failed");
    }
}
