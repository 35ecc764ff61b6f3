//! UDP transport.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;

use super::Transport;
use crate::error::{Error, Result};
use crate::util::{bind_udp_socket, random_ephemeral_port};

/// Attempts at picking a free ephemeral port before giving up.
const MAX_BIND_ATTEMPTS: u32 = 16;

/// Unconnected UDP socket.
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to exactly `addr`.
    pub async fn bind(addr: SocketAddr, recv_buffer_size: Option<usize>) -> Result<Self> {
        let socket = bind_udp_socket(addr, recv_buffer_size)
            .await
            .map_err(|source| Error::Io {
                target: Some(addr),
                source,
            })?;
        Self::from_socket(socket, addr)
    }

    /// Bind on `ip` to a random port in the IANA ephemeral range
    /// (49152-65535), retrying with a new port when the chosen one is taken.
    pub async fn bind_ephemeral(ip: IpAddr, recv_buffer_size: Option<usize>) -> Result<Self> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let port = random_ephemeral_port()?;
            let addr = SocketAddr::new(ip, port);
            match bind_udp_socket(addr, recv_buffer_size).await {
                Ok(socket) => return Self::from_socket(socket, addr),
                Err(e) if e.kind() == io::ErrorKind::AddrInUse && attempts < MAX_BIND_ATTEMPTS => {
                    tracing::debug!(snmp.port = port, attempts, "ephemeral port in use, retrying");
                }
                Err(source) => {
                    return Err(Error::Io {
                        target: Some(addr),
                        source,
                    });
                }
            }
        }
    }

    fn from_socket(socket: UdpSocket, requested: SocketAddr) -> Result<Self> {
        let local_addr = socket.local_addr().map_err(|source| Error::Io {
            target: Some(requested),
            source,
        })?;
        tracing::debug!(snmp.local_addr = %local_addr, "UDP transport bound");
        Ok(Self { socket, local_addr })
    }
}

impl Transport for UdpTransport {
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<()> {
        let sent = self.socket.send_to(data, target).await?;
        if sent != data.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short datagram write: {} of {} bytes", sent, data.len()),
            ));
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

/// Wildcard address in the same family as `target`.
pub(crate) fn wildcard_for(target: &SocketAddr) -> IpAddr {
    match target {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    }
}
