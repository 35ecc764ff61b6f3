//! Internal utilities.

use std::io;
use std::net::SocketAddr;
use std::ops::RangeInclusive;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::{Error, Result};

/// IANA dynamic/private port range (RFC 6335).
pub(crate) const EPHEMERAL_PORTS: RangeInclusive<u16> = 49152..=65535;

/// Draw a random `u32` from the OS entropy source.
pub(crate) fn random_u32() -> Result<u32> {
    let mut bytes = [0u8; 4];
    getrandom::fill(&mut bytes).map_err(|e| Error::Io {
        target: None,
        source: io::Error::other(e.to_string()),
    })?;
    Ok(u32::from_ne_bytes(bytes))
}

/// Pick a random port from [`EPHEMERAL_PORTS`].
pub(crate) fn random_ephemeral_port() -> Result<u16> {
    let start = *EPHEMERAL_PORTS.start() as u32;
    let span = *EPHEMERAL_PORTS.end() as u32 - start + 1;
    Ok((start + random_u32()? % span) as u16)
}

/// Create and bind a UDP socket with optional receive buffer size.
///
/// For IPv6 addresses, sets `IPV6_V6ONLY = false` to enable dual-stack mode,
/// allowing both IPv4 and IPv6 traffic on a single socket.
///
/// `SO_REUSEADDR` is not set, so binding a taken port fails with `AddrInUse`.
pub(crate) async fn bind_udp_socket(
    addr: SocketAddr,
    recv_buffer_size: Option<usize>,
) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    // Ignore errors - kernel will cap at rmem_max
    if let Some(size) = recv_buffer_size {
        let _ = socket.set_recv_buffer_size(size);
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}
