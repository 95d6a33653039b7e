//! Async event loop around the synchronous process core.
//!
//! One task drives the whole instance: socket readiness and timer
//! deadlines both funnel into the [`Router`] event API, so no two state
//! transitions ever run concurrently. Ctrl-C triggers a termination
//! announcement before the loop exits.

use std::net::Ipv4Addr;
use std::time::Instant;

use tracing::{error, info};

use crate::core::config::Config;
use crate::core::error::EigrpError;
use crate::export::RouteExport;
use crate::transport::{EigrpSocket, Outbound};

use super::instance::Router;

/// UDP port the stand-in transport binds; real deployments frame RTP in
/// raw IP protocol 88 outside this crate.
pub const DEFAULT_PORT: u16 = 8888;

/// Run an EIGRP process until Ctrl-C.
pub async fn run(
    config: Config,
    export: Box<dyn RouteExport + Send>,
    port: u16,
) -> Result<(), EigrpError> {
    let addrs: Vec<Ipv4Addr> = config.interfaces.iter().map(|i| i.address).collect();
    // The UDP stand-in cannot recover the arrival interface of a
    // datagram; everything is attributed to the first configured one.
    let rx_iface = config.interfaces[0].index;

    let mut socket = EigrpSocket::bind(port, &addrs).await?;
    let mut router = Router::new(config, export, Instant::now());
    info!(port, "event loop running");

    loop {
        let deadline = router.next_deadline();
        tokio::select! {
            received = socket.recv() => {
                let (bytes, src) = received?;
                let out = router.handle_packet(rx_iface, src, &bytes, Instant::now());
                transmit(&socket, &out).await;
            }
            _ = wait(deadline) => {
                let out = router.handle_timer(Instant::now());
                transmit(&socket, &out).await;
            }
            _ = tokio::signal::ctrl_c() => {
                let out = router.shutdown(Instant::now());
                transmit(&socket, &out).await;
                return Ok(());
            }
        }
    }
}

async fn transmit(socket: &EigrpSocket, datagrams: &[Outbound]) {
    for out in datagrams {
        if let Err(err) = socket.send(out).await {
            error!(%err, dest = %out.dest, "send failed");
        }
    }
}

/// Sleep until the deadline, or forever when no timer is armed.
async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}
