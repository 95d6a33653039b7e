//! Startup configuration.
//!
//! Consumed as an immutable snapshot when the process instance is created.
//! Validation mirrors the checks the process performs before binding:
//! router ID and AS number must fit the 16-bit header fields, the holdtime
//! derived from the hello interval must fit its 16-bit TLV field, and at
//! least one K-value must be non-zero.

use std::net::Ipv4Addr;
use std::time::Duration;

use super::constants::{DEFAULT_HELLO_INTERVAL, DEFAULT_K_VALUES, HOLDTIME_MULTIPLIER};
use super::error::ConfigError;
use super::types::{AsNumber, IfaceIndex, Prefix, RouterId};

/// Per-interface settings.
#[derive(Debug, Clone)]
pub struct IfaceConfig {
    /// Stable index used to key neighbors and timers.
    pub index: IfaceIndex,
    /// Address packets are sent from on this interface.
    pub address: Ipv4Addr,
    /// Link bandwidth in Kbps, feeds the composite metric.
    pub bandwidth: u32,
    /// Link delay in tens of microseconds, feeds the composite metric.
    pub delay: u32,
}

impl IfaceConfig {
    /// Create an interface config with typical Ethernet metric inputs.
    pub fn new(index: IfaceIndex, address: Ipv4Addr) -> Self {
        Self {
            index,
            address,
            bandwidth: 100_000,
            delay: 10,
        }
    }
}

/// A route injected at startup and advertised as locally originated.
#[derive(Debug, Clone)]
pub struct LocalRoute {
    /// Destination prefix.
    pub prefix: Prefix,
    /// Interface the destination is reachable through.
    pub iface: IfaceIndex,
}

/// Immutable process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Router ID placed in every outgoing header.
    pub router_id: RouterId,
    /// Autonomous system number; packets from other ASes are ignored.
    pub as_number: AsNumber,
    /// Metric weights K1..K6.
    pub k_values: [u8; 6],
    /// Interval between periodic Hellos.
    pub hello_interval: Duration,
    /// Interfaces the process is active on.
    pub interfaces: Vec<IfaceConfig>,
    /// Routes imported at startup.
    pub local_routes: Vec<LocalRoute>,
}

impl Config {
    /// Build and validate a configuration.
    pub fn new(
        router_id: u32,
        as_number: u32,
        interfaces: Vec<IfaceConfig>,
    ) -> Result<Self, ConfigError> {
        if router_id >= 65536 {
            return Err(ConfigError::FieldRange { field: "router ID" });
        }
        if as_number >= 65536 {
            return Err(ConfigError::FieldRange { field: "AS number" });
        }
        if interfaces.is_empty() {
            return Err(ConfigError::NoInterfaces);
        }
        let config = Self {
            router_id: RouterId(router_id as u16),
            as_number: AsNumber(as_number as u16),
            k_values: DEFAULT_K_VALUES,
            hello_interval: DEFAULT_HELLO_INTERVAL,
            interfaces,
            local_routes: Vec::new(),
        };
        config.validate_timing()?;
        Ok(config)
    }

    /// Replace the default K-values.
    pub fn with_k_values(mut self, k_values: [u8; 6]) -> Result<Self, ConfigError> {
        if k_values.iter().all(|&k| k == 0) {
            return Err(ConfigError::AllKValuesZero);
        }
        self.k_values = k_values;
        Ok(self)
    }

    /// Replace the default hello interval. Holdtime follows as 3x.
    pub fn with_hello_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        self.hello_interval = interval;
        self.validate_timing()?;
        Ok(self)
    }

    /// Add a route to import and advertise at startup.
    pub fn with_local_route(mut self, prefix: Prefix, iface: IfaceIndex) -> Self {
        self.local_routes.push(LocalRoute { prefix, iface });
        self
    }

    /// Hold time advertised in the parameter TLV.
    pub fn holdtime(&self) -> Duration {
        self.hello_interval * HOLDTIME_MULTIPLIER
    }

    /// Hold time as carried on the wire.
    pub fn holdtime_secs(&self) -> u16 {
        self.holdtime().as_secs() as u16
    }

    /// Look up an interface by index.
    pub fn iface(&self, index: IfaceIndex) -> Option<&IfaceConfig> {
        self.interfaces.iter().find(|i| i.index == index)
    }

    /// True when `addr` is one of our own interface addresses.
    pub fn is_local_address(&self, addr: Ipv4Addr) -> bool {
        self.interfaces.iter().any(|i| i.address == addr)
    }

    fn validate_timing(&self) -> Result<(), ConfigError> {
        // Holdtime rides in a 16-bit seconds field.
        let max = (u16::MAX as u64) / (HOLDTIME_MULTIPLIER as u64);
        let secs = self.hello_interval.as_secs();
        if secs < 1 || secs > max {
            return Err(ConfigError::HelloInterval { max });
        }
        Ok(())
    }
}
