//! Free port discovery for space servers.
//!
//! Probes ascending TCP ports on a host until one binds.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, ToSocketAddrs};

use tracing::debug;

use crate::space::SpaceError;

/// Port the probe starts from when the host has no preference.
pub const DEFAULT_START_PORT: u16 = 7860;

/// Bind host used when none is configured.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Returns the first port at or above `start_port` that `host` can bind.
///
/// The listener used for the probe is dropped before returning, so the port
/// is free again for the caller. The search stops at 65535.
///
/// # Errors
/// Returns `SpaceError::PortsExhausted` when no port up to 65535 binds.
pub fn find_free_port(host: Option<&str>, start_port: Option<u16>) -> Result<u16, SpaceError> {
    find_free_addr(host, start_port).map(|addr| addr.port())
}

/// Returns the first resolved address at or above `start_port` that binds.
///
/// Each port is tried on every address `host` resolves to, in resolver
/// order, and the address that actually bound is returned. Callers should
/// bind exactly this address.
///
/// # Errors
/// Returns `SpaceError::PortsExhausted` when no port up to 65535 binds.
pub fn find_free_addr(
    host: Option<&str>,
    start_port: Option<u16>,
) -> Result<SocketAddr, SpaceError> {
    let host = host.unwrap_or(DEFAULT_HOST);
    let start = start_port.unwrap_or(DEFAULT_START_PORT);

    for port in start..=u16::MAX {
        if let Some(addr) = try_bind(host, port) {
            debug!("[PORT] {} is free", addr);
            return Ok(addr);
        }
    }

    Err(SpaceError::PortsExhausted {
        host: host.to_string(),
        start,
    })
}

/// Returns the first address `host` resolves to for `port` that binds.
fn try_bind(host: &str, port: u16) -> Option<SocketAddr> {
    let addrs = (host, port).to_socket_addrs().ok()?;
    addrs
        .into_iter()
        .find(|addr| TcpListener::bind(addr).is_ok())
}

/// Maps wildcard bind addresses to loopback.
#[must_use]
pub fn connectable(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}
