//! Composite metric computation.
//!
//! The vector components carried on the wire are reduced to a single
//! 32-bit composite value with the classic K-weighted formula:
//!
//! ```text
//! metric = (K1*bw + K2*bw/(256-load) + K3*delay) * K5/(K4+reliability)
//! ```
//!
//! where `bw = 256 * 10^7 / bandwidth_kbps` and `delay` is scaled by 256.
//! The final factor applies only when K5 is non-zero. Arithmetic is done
//! in u64 and saturates into the unreachable sentinel.

use crate::core::constants::{DELAY_UNREACHABLE, METRIC_UNREACHABLE};
use crate::packet::WireMetric;

/// Bandwidth numerator, classic metric scaling.
const BW_SCALE: u64 = 256 * 10_000_000;

impl WireMetric {
    /// A metric advertising the destination as unreachable.
    pub fn unreachable() -> Self {
        Self {
            delay: DELAY_UNREACHABLE,
            bandwidth: 0,
            mtu: 0,
            hop_count: 0,
            reliability: 0,
            load: 0,
        }
    }

    /// The delay sentinel marks unreachable destinations.
    pub fn is_unreachable(&self) -> bool {
        self.delay == DELAY_UNREACHABLE
    }

    /// Metric for a directly connected link.
    pub fn connected(bandwidth: u32, delay: u32) -> Self {
        Self {
            delay,
            bandwidth,
            mtu: 1500,
            hop_count: 0,
            reliability: 255,
            load: 1,
        }
    }
}

/// Reduce vector components to the composite 32-bit metric.
pub fn composite(metric: &WireMetric, k: &[u8; 6]) -> u32 {
    if metric.is_unreachable() {
        return METRIC_UNREACHABLE;
    }
    let k1 = u64::from(k[0]);
    let k2 = u64::from(k[1]);
    let k3 = u64::from(k[2]);
    let k4 = u64::from(k[3]);
    let k5 = u64::from(k[4]);

    // A zero bandwidth would divide by zero; treat it as the slowest
    // expressible link instead.
    let bw = BW_SCALE / u64::from(metric.bandwidth.max(1));
    let delay = 256 * u64::from(metric.delay);
    let load_div = 256 - u64::from(metric.load).min(255);

    let mut value = k1
        .saturating_mul(bw)
        .saturating_add(k2.saturating_mul(bw) / load_div)
        .saturating_add(k3.saturating_mul(delay));
    if k5 != 0 {
        value = value.saturating_mul(k5) / (k4 + u64::from(metric.reliability)).max(1);
    }
    u32::try_from(value).unwrap_or(METRIC_UNREACHABLE)
}

/// Combine a neighbor's reported metric with the cost of the link it was
/// heard on: delay accumulates, bandwidth and MTU take the minimum, hop
/// count increments. Unreachable stays unreachable.
pub fn add_link_cost(reported: &WireMetric, link_bandwidth: u32, link_delay: u32) -> WireMetric {
    if reported.is_unreachable() {
        return WireMetric::unreachable();
    }
    let delay = reported.delay.saturating_add(link_delay);
    WireMetric {
        delay: if delay == DELAY_UNREACHABLE {
            DELAY_UNREACHABLE - 1
        } else {
            delay
        },
        bandwidth: if reported.bandwidth == 0 {
            link_bandwidth
        } else {
            reported.bandwidth.min(link_bandwidth)
        },
        mtu: reported.mtu.min(1500),
        hop_count: reported.hop_count.saturating_add(1),
        reliability: reported.reliability,
        load: reported.load,
    }
}
