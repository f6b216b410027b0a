//! Network helpers used at startup.
//!
//! This module discovers the address other machines on the local network can
//! reach the server at, and frees the listening port from a previous run.

use anyhow::Result;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Public address used only to pick an outbound interface. No packet is sent.
const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Time given to a terminated process to release its port.
pub const RECLAIM_SETTLE: Duration = Duration::from_secs(1);

/// Finds the local address of the interface that routes to the wider network.
///
/// Connecting a UDP socket selects a route without sending anything, after
/// which the socket's local address is the interface address.
///
/// # Returns
/// * The interface address, or `None` when there is no usable route.
pub async fn local_ip() -> Option<IpAddr> {
    let socket = match UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await {
        Ok(socket) => socket,
        Err(e) => {
            debug!("Could not bind probe socket: {}", e);
            return None;
        }
    };
    if let Err(e) = socket.connect(ROUTE_PROBE_ADDR).await {
        debug!("No route for local address discovery: {}", e);
        return None;
    }
    match socket.local_addr() {
        Ok(addr) if !addr.ip().is_unspecified() => Some(addr.ip()),
        Ok(_) => None,
        Err(e) => {
            debug!("Probe socket has no local address: {}", e);
            None
        }
    }
}

/// Terminates whatever process currently holds `port` over TCP.
///
/// Uses `lsof` and `kill` on macOS and `fuser -k` on other Unix systems. A
/// missing tool or an empty port is not an error.
///
/// # Arguments
/// * `port` - The TCP port to free.
///
/// # Returns
/// * `true` if a process was terminated, `false` otherwise.
///
/// # Errors
/// Returns an error only if a lookup tool produced unreadable output.
pub async fn reclaim_port(port: u16) -> Result<bool> {
    if cfg!(target_os = "macos") {
        reclaim_with_lsof(port).await
    } else if cfg!(unix) {
        reclaim_with_fuser(port).await
    } else {
        debug!("Port reclaim is not supported on this platform");
        Ok(false)
    }
}

async fn reclaim_with_lsof(port: u16) -> Result<bool> {
    let output = match Command::new("lsof")
        .arg(format!("-ti:{}", port))
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!("lsof unavailable, not reclaiming port {}: {}", port, e);
            return Ok(false);
        }
    };
    let pids = String::from_utf8(output.stdout)?;
    let mut killed = false;
    for pid in pids.split_whitespace() {
        match Command::new("kill").arg("-9").arg(pid).status().await {
            Ok(status) if status.success() => {
                info!("Killed existing process {} on port {}", pid, port);
                killed = true;
            }
            Ok(status) => warn!("kill {} exited with {}", pid, status),
            Err(e) => warn!("Failed to kill process {}: {}", pid, e),
        }
    }
    Ok(killed)
}

async fn reclaim_with_fuser(port: u16) -> Result<bool> {
    let output = match Command::new("fuser")
        .arg("-k")
        .arg(format!("{}/tcp", port))
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) => {
            debug!("fuser unavailable, not reclaiming port {}: {}", port, e);
            return Ok(false);
        }
    };
    // fuser prints the pids it signalled on stdout and exits non-zero when none matched.
    let pids = String::from_utf8(output.stdout)?;
    if output.status.success() && !pids.trim().is_empty() {
        info!("Killed existing process {} on port {}", pids.trim(), port);
        return Ok(true);
    }
    Ok(false)
}
