//! SNMP session: request/response correlation, retries and walks.
//!
//! A [`Session`] is a cheap handle onto a dispatcher task that owns the
//! socket. Handles can be cloned and used from many tasks at once; every
//! operation sends one request and waits for its own reply.
//!
//! # Example
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use snmp_session::{Session, oid};
//! use std::time::Duration;
//!
//! # async fn example() -> snmp_session::Result<()> {
//! let session = Session::community("192.168.1.1", b"public")
//!     .timeout(Duration::from_secs(2))
//!     .build()
//!     .await?;
//!
//! let mut walk = session.walk_subtree(oid!(1, 3, 6, 1, 2, 1, 1));
//! while let Some(reply) = walk.next().await {
//!     for vb in &reply?.pdu.varbinds {
//!         println!("{vb}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod dispatcher;
mod id;
mod pending;
mod scheduler;
mod walk;

pub use builder::SessionBuilder;
pub use config::{
    DEFAULT_PORT, DEFAULT_RETRIES, DEFAULT_TIMEOUT, DEFAULT_TRAP_PORT, SessionConfig,
};
pub use id::MAX_ALLOCATION_ATTEMPTS;
pub use walk::{Walk, WalkControl};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::credential::Credential;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::oid::Oid;
use crate::pdu::PduType;
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;
use dispatcher::Command;

/// Root of a walk started without an explicit OID (MIB-2).
pub const DEFAULT_WALK_ROOT: [u32; 6] = [1, 3, 6, 1, 2, 1];

/// sysUpTime.0, first varbind of every notification.
const SYS_UPTIME_0: [u32; 9] = [1, 3, 6, 1, 2, 1, 1, 3, 0];

/// snmpTrapOID.0, second varbind of every notification.
const SNMP_TRAP_OID_0: [u32; 11] = [1, 3, 6, 1, 6, 3, 1, 1, 4, 1, 0];

/// Handle to an SNMP session.
///
/// Cloning is cheap; clones share the socket and pending table. The session
/// stays open until [`close`](Self::close) is called, the socket fails, or
/// the last handle is dropped.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
    target: SocketAddr,
}

struct Shared {
    commands: mpsc::UnboundedSender<Command>,
    closed: CancellationToken,
    finished: CancellationToken,
    config: SessionConfig,
    local_addr: SocketAddr,
    created: Instant,
}

impl Session {
    /// Start building a community-based session (SNMPv2c unless
    /// [`version`](SessionBuilder::version) says otherwise).
    pub fn community(target: impl Into<String>, community: impl AsRef<[u8]>) -> SessionBuilder {
        SessionBuilder::new(target).community(community)
    }

    /// Start building an SNMPv3 session for `credential`.
    pub fn with_credential(target: impl Into<String>, credential: Credential) -> SessionBuilder {
        SessionBuilder::new(target)
            .credential(credential)
            .version(Version::V3)
    }

    /// Start building a session with nothing preset.
    pub fn builder(target: impl Into<String>) -> SessionBuilder {
        SessionBuilder::new(target)
    }

    pub(crate) fn from_parts(
        commands: mpsc::UnboundedSender<Command>,
        closed: CancellationToken,
        finished: CancellationToken,
        config: SessionConfig,
        local_addr: SocketAddr,
        target: SocketAddr,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                commands,
                closed,
                finished,
                config,
                local_addr,
                created: Instant::now(),
            }),
            target,
        }
    }

    /// Default destination of requests.
    pub fn target(&self) -> SocketAddr {
        self.target
    }

    /// Destination of traps and informs: the target host on the trap port.
    pub fn trap_target(&self) -> SocketAddr {
        SocketAddr::new(self.target.ip(), self.shared.config.trap_port)
    }

    /// Local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }

    /// Protocol version.
    pub fn version(&self) -> Version {
        self.shared.config.version
    }

    /// Settings the session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    /// A handle to the same session that sends to `target` by default.
    pub fn retarget(&self, target: SocketAddr) -> Session {
        Session {
            shared: self.shared.clone(),
            target,
        }
    }

    /// A handle to the same session that sends to another port on the
    /// target host.
    pub fn with_port(&self, port: u16) -> Session {
        self.retarget(SocketAddr::new(self.target.ip(), port))
    }

    /// Whether the session has been closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.is_cancelled()
    }

    /// Close the session.
    ///
    /// Pending requests fail with [`Error::Closed`], the socket is released
    /// and later operations fail immediately without sending. Returns once
    /// the dispatcher has stopped. Closing twice is harmless.
    pub async fn close(&self) {
        self.shared.closed.cancel();
        self.shared.finished.cancelled().await;
    }

    /// Number of requests waiting for a reply.
    pub async fn in_flight(&self) -> Result<usize> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::InFlight { reply })?;
        rx.await.map_err(|_| Error::Closed)
    }

    fn submit(&self, command: Command) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.shared.commands.send(command).map_err(|_| Error::Closed)
    }

    async fn request(
        &self,
        pdu_type: PduType,
        varbinds: Vec<VarBind>,
        target: SocketAddr,
    ) -> Result<Message> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Request {
            pdu_type,
            varbinds,
            target,
            reply,
        })?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// GET one object.
    ///
    /// The reply is returned as is; agent error statuses and exception
    /// values are in the message, not in the `Err` variant.
    pub async fn get(&self, oid: &Oid) -> Result<Message> {
        self.request(
            PduType::GetRequest,
            vec![VarBind::null(oid.clone())],
            self.target,
        )
        .await
    }

    /// GET several objects in one request.
    pub async fn get_many(&self, oids: &[Oid]) -> Result<Message> {
        let varbinds = oids.iter().cloned().map(VarBind::null).collect();
        self.request(PduType::GetRequest, varbinds, self.target)
            .await
    }

    /// GETNEXT: the first object after `oid`.
    pub async fn get_next(&self, oid: &Oid) -> Result<Message> {
        self.request(
            PduType::GetNextRequest,
            vec![VarBind::null(oid.clone())],
            self.target,
        )
        .await
    }

    /// SET one object.
    pub async fn set(&self, varbind: VarBind) -> Result<Message> {
        self.request(PduType::SetRequest, vec![varbind], self.target)
            .await
    }

    /// Send an InformRequest to the trap port and wait for its acknowledgement.
    pub async fn inform(&self, trap_oid: &Oid, varbinds: Vec<VarBind>) -> Result<Message> {
        let varbinds = self.notification_varbinds(trap_oid, varbinds)?;
        self.request(PduType::InformRequest, varbinds, self.trap_target())
            .await
    }

    /// Send an SNMPv2-Trap to the trap port.
    ///
    /// Traps are not acknowledged: this resolves once the datagram is sent.
    pub async fn trap(&self, trap_oid: &Oid, varbinds: Vec<VarBind>) -> Result<()> {
        let varbinds = self.notification_varbinds(trap_oid, varbinds)?;
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Notify {
            varbinds,
            target: self.trap_target(),
            reply,
        })?;
        rx.await.map_err(|_| Error::Closed)?
    }

    /// Prefix `varbinds` with sysUpTime.0 and snmpTrapOID.0 (RFC 3416 Section 4.2.6).
    fn notification_varbinds(&self, trap_oid: &Oid, varbinds: Vec<VarBind>) -> Result<Vec<VarBind>> {
        if self.version() == Version::V1 {
            return Err(Error::config(
                "SNMPv1 sessions cannot send SNMPv2 notifications",
            ));
        }

        let uptime = self.shared.created.elapsed().as_millis() / 10;
        let mut all = Vec::with_capacity(varbinds.len() + 2);
        all.push(VarBind::new(
            Oid::from_slice(&SYS_UPTIME_0),
            Value::TimeTicks(u32::try_from(uptime).unwrap_or(u32::MAX)),
        ));
        all.push(VarBind::new(
            Oid::from_slice(&SNMP_TRAP_OID_0),
            Value::ObjectIdentifier(trap_oid.clone()),
        ));
        all.extend(varbinds);
        Ok(all)
    }

    /// Walk by repeated GETNEXT, starting after `root` (MIB-2 when `None`).
    ///
    /// The walk runs until the agent reports the end of its view; it is not
    /// limited to the subtree under `root`. See [`walk_subtree`](Self::walk_subtree).
    pub fn walk(&self, root: Option<Oid>) -> Walk {
        let start = root.unwrap_or_else(|| Oid::from_slice(&DEFAULT_WALK_ROOT));
        Walk::new(self.clone(), start, None)
    }

    /// Walk the subtree under `root`, stopping at the first reply outside it.
    pub fn walk_subtree(&self, root: Oid) -> Walk {
        Walk::new(self.clone(), root.clone(), Some(root))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("local_addr", &self.shared.local_addr)
            .field("version", &self.shared.config.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests;
