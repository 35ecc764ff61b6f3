//! Transport layer abstraction.
//!
//! Provides the [`Transport`] trait, the UDP implementation and (with the
//! `testing` feature) an in-memory mock.

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::*;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use std::future::Future;
use std::io;
use std::net::SocketAddr;

/// Unconnected datagram socket used by a session.
///
/// A transport is owned by exactly one session dispatcher, which is the only
/// caller of `send_to` and `recv_from`. Closing the transport is dropping it.
///
/// `recv_from` must be cancel safe: the dispatcher polls it inside
/// `tokio::select!` and drops the future whenever another branch wins.
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram to `target`.
    fn send_to(&self, data: &[u8], target: SocketAddr)
    -> impl Future<Output = io::Result<()>> + Send;

    /// Receive one datagram into `buf`, returning its length and source.
    ///
    /// Resets, refusals, interruptions and oversize datagrams are skipped.
    /// Any other error is fatal for the session.
    fn recv_from(&self, buf: &mut [u8])
    -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;
}
