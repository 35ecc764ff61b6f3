//! Session configuration.

use std::net::IpAddr;
use std::time::Duration;

use crate::message::DEFAULT_MAX_MESSAGE_SIZE;
use crate::version::Version;

/// Default agent port.
pub const DEFAULT_PORT: u16 = 161;

/// Default notification receiver port.
pub const DEFAULT_TRAP_PORT: u16 = 162;

/// Default number of retransmissions after the first send.
pub const DEFAULT_RETRIES: u32 = 1;

/// Default wait per transmission.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Session settings. Built by [`SessionBuilder`](super::SessionBuilder);
/// read back through [`Session::config`](super::Session::config).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Destination port when the target does not name one (default: 161).
    pub port: u16,
    /// Destination port for traps and informs (default: 162).
    pub trap_port: u16,
    /// Protocol version of every message the session sends.
    pub version: Version,
    /// Retransmissions after the first send (default: 1).
    pub retries: u32,
    /// Wait per transmission before retrying or failing (default: 5s).
    pub timeout: Duration,
    /// Receive buffer size; larger datagrams are truncated (default: 65535).
    pub max_message_size: usize,
    /// `SO_RCVBUF` for the UDP socket, if set.
    pub recv_buffer_size: Option<usize>,
    /// Log a warning when a reply comes from another address than the
    /// request was sent to (default: true).
    pub warn_on_source_mismatch: bool,
    /// Local address to bind. Defaults to the wildcard address of the
    /// target's family.
    pub source_address: Option<IpAddr>,
    /// Local port to bind. Defaults to a random port in 49152-65535.
    pub source_port: Option<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            trap_port: DEFAULT_TRAP_PORT,
            version: Version::V2c,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE as usize,
            recv_buffer_size: None,
            warn_on_source_mismatch: true,
            source_address: None,
            source_port: None,
        }
    }
}
