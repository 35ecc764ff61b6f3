//! Session builder.
//!
//! # Entry Points
//!
//! - [`Session::community()`] - SNMPv2c (or v1) with a community string
//! - [`Session::with_credential()`] - SNMPv3 with a USM credential
//! - [`Session::builder()`] - nothing preset
//!
//! Conflicting security settings are reported by
//! [`build()`](SessionBuilder::build) as [`Error::Configuration`].
//!
//! # Examples
//!
//! ```rust,no_run
//! # use snmp_session::{Credential, Session, Version};
//! # use std::time::Duration;
//! # async fn example() -> snmp_session::Result<()> {
//! let v1 = Session::community("10.0.0.1", b"public")
//!     .version(Version::V1)
//!     .retries(3)
//!     .build()
//!     .await?;
//!
//! let v3 = Session::with_credential("10.0.0.2:1161", Credential::new("monitor"))
//!     .timeout(Duration::from_secs(2))
//!     .build()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::Session;
use super::config::SessionConfig;
use super::dispatcher::{DispatchSettings, Dispatcher};
use crate::codec::{BerCodec, Codec};
use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::message::Security;
use crate::transport::{Transport, UdpTransport, wildcard_for};
use crate::version::Version;

/// Builder for [`Session`].
pub struct SessionBuilder<C = BerCodec> {
    target: String,
    community: Option<Bytes>,
    credential: Option<Credential>,
    config: SessionConfig,
    span: Option<tracing::Span>,
    codec: C,
}

impl SessionBuilder<BerCodec> {
    pub(crate) fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            community: None,
            credential: None,
            config: SessionConfig::default(),
            span: None,
            codec: BerCodec,
        }
    }
}

impl<C: Codec> SessionBuilder<C> {
    /// Authenticate with a community string (SNMPv1/v2c).
    pub fn community(mut self, community: impl AsRef<[u8]>) -> Self {
        self.community = Some(Bytes::copy_from_slice(community.as_ref()));
        self
    }

    /// Authenticate as a USM user (SNMPv3).
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Set the protocol version.
    pub fn version(mut self, version: Version) -> Self {
        self.config.version = version;
        self
    }

    /// Destination port when the target does not name one (default: 161).
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Destination port for traps and informs (default: 162).
    pub fn trap_port(mut self, port: u16) -> Self {
        self.config.trap_port = port;
        self
    }

    /// Retransmissions after the first send (default: 1).
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.retries = retries;
        self
    }

    /// Wait per transmission (default: 5s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Local address to bind.
    pub fn source_address(mut self, addr: IpAddr) -> Self {
        self.config.source_address = Some(addr);
        self
    }

    /// Local port to bind. Without this a random port in 49152-65535 is used.
    pub fn source_port(mut self, port: u16) -> Self {
        self.config.source_port = Some(port);
        self
    }

    /// Receive buffer size; larger datagrams are truncated (default: 65535).
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.config.max_message_size = size;
        self
    }

    /// `SO_RCVBUF` for the socket. The kernel may cap it.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.config.recv_buffer_size = Some(size);
        self
    }

    /// Warn when a reply arrives from another address than the request
    /// went to (default: true). Common behind NAT and on multi-homed agents.
    pub fn warn_on_source_mismatch(mut self, warn: bool) -> Self {
        self.config.warn_on_source_mismatch = warn;
        self
    }

    /// Span the dispatcher task runs in. Defaults to a `snmp_session` debug
    /// span carrying the target.
    pub fn span(mut self, span: tracing::Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Replace the wire codec.
    pub fn codec<C2: Codec>(self, codec: C2) -> SessionBuilder<C2> {
        SessionBuilder {
            target: self.target,
            community: self.community,
            credential: self.credential,
            config: self.config,
            span: self.span,
            codec,
        }
    }

    /// Resolve the target, bind a UDP socket and start the session.
    pub async fn build(self) -> Result<Session> {
        self.security()?;
        let target = self.resolve_target().await?;

        let ip = self
            .config
            .source_address
            .unwrap_or_else(|| wildcard_for(&target));
        let transport = match self.config.source_port {
            Some(port) => {
                UdpTransport::bind(SocketAddr::new(ip, port), self.config.recv_buffer_size).await?
            }
            None => UdpTransport::bind_ephemeral(ip, self.config.recv_buffer_size).await?,
        };

        self.start(transport, target)
    }

    /// Start the session over a caller-supplied transport.
    pub async fn build_with_transport<T: Transport>(self, transport: T) -> Result<Session> {
        self.security()?;
        let target = self.resolve_target().await?;
        self.start(transport, target)
    }

    /// Check the community/credential/version combination.
    fn security(&self) -> Result<Security> {
        let version = self.config.version;
        match (&self.community, &self.credential) {
            (None, None) => Err(Error::config("a community or a credential is required")),
            (Some(_), Some(_)) => Err(Error::config(
                "community and credential are mutually exclusive",
            )),
            (Some(community), None) if version.uses_community() => {
                Ok(Security::Community(community.clone()))
            }
            (Some(_), None) => Err(Error::config(format!(
                "{version} requires a credential, not a community"
            ))),
            (None, Some(credential)) if version == Version::V3 => {
                Ok(Security::Usm(credential.clone()))
            }
            (None, Some(_)) => Err(Error::config(format!(
                "a credential requires SNMPv3, not {version}"
            ))),
        }
    }

    /// Accepts an IP address, `ip:port`, `[v6]:port`, `host` or `host:port`.
    async fn resolve_target(&self) -> Result<SocketAddr> {
        let target = self.target.trim();
        if let Ok(ip) = target.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.config.port));
        }
        if let Ok(addr) = target.parse::<SocketAddr>() {
            return Ok(addr);
        }

        let (host, port) = match target.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => match port.parse::<u16>() {
                Ok(port) => (host, port),
                Err(_) => (target, self.config.port),
            },
            _ => (target, self.config.port),
        };

        tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| Error::Io {
                target: None,
                source,
            })?
            .next()
            .ok_or_else(|| Error::Io {
                target: None,
                source: io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("could not resolve address: {}", self.target),
                ),
            })
    }

    fn start<T: Transport>(self, transport: T, target: SocketAddr) -> Result<Session> {
        let security = self.security()?;
        let local_addr = transport.local_addr();
        let span = self.span.unwrap_or_else(
            || tracing::debug_span!("snmp_session", snmp.target = %target, snmp.version = %self.config.version),
        );

        let settings = DispatchSettings {
            version: self.config.version,
            security,
            retries: self.config.retries,
            timeout: self.config.timeout,
            max_message_size: self.config.max_message_size,
            warn_on_source_mismatch: self.config.warn_on_source_mismatch,
        };

        let (commands, rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();
        let finished = CancellationToken::new();
        let dispatcher = Dispatcher::new(transport, self.codec, settings, rx, closed.clone());
        tokio::spawn(dispatcher.run(finished.clone()).instrument(span));

        tracing::debug!(
            snmp.target = %target,
            snmp.local_addr = %local_addr,
            snmp.version = %self.config.version,
            "session started"
        );

        Ok(Session::from_parts(
            commands,
            closed,
            finished,
            self.config,
            local_addr,
            target,
        ))
    }
}
