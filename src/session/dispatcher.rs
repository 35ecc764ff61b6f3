//! The per-session dispatcher task.
//!
//! One dispatcher runs per session and owns the transport, the pending
//! table, the retry scheduler and the ID allocator. Session handles reach it
//! only through [`Command`]s. Each loop iteration handles exactly one event:
//! close, a command, an inbound datagram or an expired timer.

use std::future::poll_fn;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::id::{IdAllocator, IdWidth};
use super::pending::{PendingRequest, PendingTable, Sink};
use super::scheduler::{Expiry, Scheduler, TimerTag};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::message::{Message, Security};
use crate::pdu::{Pdu, PduType};
use crate::transport::Transport;
use crate::varbind::VarBind;
use crate::version::Version;

/// A request from a session handle to its dispatcher.
pub(crate) enum Command {
    /// Send a confirmed request and resolve `reply` with the response.
    Request {
        pdu_type: PduType,
        varbinds: Vec<VarBind>,
        target: SocketAddr,
        reply: Sink,
    },
    /// Send an SNMPv2-Trap. Nothing is registered; `reply` reports the send.
    Notify {
        varbinds: Vec<VarBind>,
        target: SocketAddr,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Report the number of pending requests.
    InFlight { reply: oneshot::Sender<usize> },
}

impl Command {
    fn reject(self, error: Error) {
        match self {
            Command::Request { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            Command::Notify { reply, .. } => {
                let _ = reply.send(Err(error));
            }
            // Dropping the sender reads as Closed on the handle side.
            Command::InFlight { .. } => {}
        }
    }
}

/// Per-request settings copied from the session configuration.
pub(crate) struct DispatchSettings {
    pub(crate) version: Version,
    pub(crate) security: Security,
    pub(crate) retries: u32,
    pub(crate) timeout: Duration,
    pub(crate) max_message_size: usize,
    pub(crate) warn_on_source_mismatch: bool,
}

pub(crate) struct Dispatcher<T, C> {
    transport: T,
    codec: C,
    settings: DispatchSettings,
    commands: mpsc::UnboundedReceiver<Command>,
    closed: CancellationToken,
    table: PendingTable,
    scheduler: Scheduler,
    ids: IdAllocator,
    buf: Vec<u8>,
}

impl<T: Transport, C: Codec> Dispatcher<T, C> {
    pub(crate) fn new(
        transport: T,
        codec: C,
        settings: DispatchSettings,
        commands: mpsc::UnboundedReceiver<Command>,
        closed: CancellationToken,
    ) -> Self {
        let buf = vec![0u8; settings.max_message_size];
        Self {
            transport,
            codec,
            settings,
            commands,
            closed,
            table: PendingTable::new(),
            scheduler: Scheduler::new(),
            ids: IdAllocator::new(),
            buf,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_ids(mut self, ids: IdAllocator) -> Self {
        self.ids = ids;
        self
    }

    /// Run until the session is closed, every handle is dropped or the
    /// socket fails. `finished` is cancelled once the transport is released.
    pub(crate) async fn run(mut self, finished: CancellationToken) {
        let guard = finished.drop_guard();
        tracing::debug!(snmp.local_addr = %self.transport.local_addr(), "dispatcher started");

        loop {
            tokio::select! {
                biased;

                _ = self.closed.cancelled() => break,

                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => {
                        tracing::debug!("all session handles dropped");
                        break;
                    }
                },

                received = self.transport.recv_from(&mut self.buf) => match received {
                    Ok((len, source)) => self.handle_datagram(len, source),
                    Err(error) if is_per_datagram(&error) => {
                        tracing::warn!(error = %error, kind = ?error.kind(), "socket receive error, continuing");
                    }
                    Err(error) => {
                        self.fail_transport(error);
                        break;
                    }
                },

                Some(tag) = poll_fn(|cx| self.scheduler.poll_expired(cx)), if !self.scheduler.is_empty() => {
                    self.handle_expiry(tag).await;
                }
            }
        }

        self.shutdown();
        drop(self);
        drop(guard);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Request {
                pdu_type,
                varbinds,
                target,
                reply,
            } => self.start_request(pdu_type, varbinds, target, reply).await,
            Command::Notify {
                varbinds,
                target,
                reply,
            } => {
                let outcome = self.send_notification(varbinds, target).await;
                let _ = reply.send(outcome);
            }
            Command::InFlight { reply } => {
                let _ = reply.send(self.table.len());
            }
        }
    }

    fn build_message(&self, pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Bytes {
        let message = Message::new(
            self.settings.version,
            self.settings.security.clone(),
            Pdu::new(pdu_type, request_id, varbinds),
        );
        self.codec.encode(&message)
    }

    async fn start_request(
        &mut self,
        pdu_type: PduType,
        varbinds: Vec<VarBind>,
        target: SocketAddr,
        reply: Sink,
    ) {
        if reply.is_closed() {
            return;
        }

        let id = match self
            .ids
            .allocate(IdWidth::Bits32, |id| self.table.contains(id))
        {
            Ok(id) => id,
            Err(error) => {
                tracing::warn!(snmp.target = %target, pending = self.table.len(), error = %error, "request id allocation failed");
                let _ = reply.send(Err(error));
                return;
            }
        };

        let payload = self.build_message(pdu_type, id, varbinds);
        let request = PendingRequest::new(
            target,
            payload.clone(),
            self.settings.retries,
            self.settings.timeout,
            reply,
        );
        self.table.register(id, request);

        tracing::trace!(
            snmp.request_id = id,
            snmp.target = %target,
            snmp.pdu_type = %pdu_type,
            snmp.bytes = payload.len(),
            "sending request"
        );

        if let Err(source) = self.transport.send_to(&payload, target).await {
            tracing::debug!(snmp.request_id = id, snmp.target = %target, error = %source, "send failed");
            if let Some(request) = self.table.remove(id) {
                request.resolve(Err(Error::Io {
                    target: Some(target),
                    source,
                }));
            }
            return;
        }

        if let Some(request) = self.table.get_mut(id) {
            self.scheduler.arm(id, request);
        }
    }

    async fn send_notification(&mut self, varbinds: Vec<VarBind>, target: SocketAddr) -> Result<()> {
        let id = self
            .ids
            .allocate(IdWidth::Bits16, |id| self.table.contains(id))?;
        let payload = self.build_message(PduType::TrapV2, id, varbinds);

        tracing::trace!(
            snmp.request_id = id,
            snmp.target = %target,
            snmp.bytes = payload.len(),
            "sending trap"
        );
        self.transport
            .send_to(&payload, target)
            .await
            .map_err(|source| Error::Io {
                target: Some(target),
                source,
            })
    }

    fn handle_datagram(&mut self, len: usize, source: SocketAddr) {
        tracing::trace!(snmp.source = %source, snmp.bytes = len, "received datagram");
        let data = Bytes::copy_from_slice(&self.buf[..len]);

        let message = match self.codec.decode(data) {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(snmp.source = %source, error = %error, "dropping undecodable datagram");
                return;
            }
        };

        let id = message.pdu.request_id;
        if !matches!(message.pdu.pdu_type, PduType::Response | PduType::Report) {
            tracing::debug!(
                snmp.request_id = id,
                snmp.source = %source,
                snmp.pdu_type = %message.pdu.pdu_type,
                "dropping unexpected PDU type"
            );
            return;
        }

        let Some(target) = self.table.get(id).map(|request| request.target) else {
            tracing::debug!(snmp.request_id = id, snmp.source = %source, "received response for unknown request_id");
            return;
        };

        if self.settings.warn_on_source_mismatch && source != target {
            tracing::warn!(
                snmp.request_id = id,
                snmp.target = %target,
                snmp.source = %source,
                "response source address mismatch"
            );
        }

        self.table.complete(id, message);
    }

    async fn handle_expiry(&mut self, tag: TimerTag) {
        match self.scheduler.fire(&mut self.table, tag) {
            Expiry::Stale => {}
            Expiry::Abandoned => {
                tracing::debug!(snmp.request_id = tag.id, "caller gone, dropping request");
            }
            Expiry::TimedOut => {
                tracing::debug!(snmp.request_id = tag.id, "request timed out");
            }
            Expiry::Resend {
                target,
                payload,
                attempt,
            } => {
                tracing::trace!(snmp.request_id = tag.id, snmp.target = %target, attempt, "retransmitting request");
                if let Err(source) = self.transport.send_to(&payload, target).await {
                    tracing::debug!(snmp.request_id = tag.id, snmp.target = %target, error = %source, "retransmit failed");
                    if let Some(request) = self.table.remove(tag.id) {
                        request.resolve(Err(Error::Io {
                            target: Some(target),
                            source,
                        }));
                    }
                }
            }
        }
    }

    /// A receive error leaves the socket unusable: fail everything and close.
    fn fail_transport(&mut self, error: io::Error) {
        tracing::error!(error = %error, pending = self.table.len(), "socket receive failed, closing session");
        let kind = error.kind();
        let text = error.to_string();
        self.table.fail_all(|_, request| Error::Io {
            target: Some(request.target),
            source: io::Error::new(kind, text.clone()),
        });
        self.closed.cancel();
    }

    fn shutdown(&mut self) {
        self.closed.cancel();
        let failed = self.table.fail_all(|_, _| Error::Closed);

        self.commands.close();
        let mut rejected = 0usize;
        while let Ok(command) = self.commands.try_recv() {
            command.reject(Error::Closed);
            rejected += 1;
        }
        tracing::debug!(failed, rejected, "dispatcher stopped");
    }
}

/// Receive errors that concern one datagram, not the socket. An unconnected
/// UDP socket reports ICMP port-unreachable from any peer as a reset or
/// refusal on the next receive.
fn is_per_datagram(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    ) || matches!((error.raw_os_error(), EMSGSIZE), (Some(code), Some(emsgsize)) if code == emsgsize)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
const EMSGSIZE: Option<i32> = Some(90);
#[cfg(windows)]
const EMSGSIZE: Option<i32> = Some(10040);
#[cfg(all(unix, not(any(target_os = "linux", target_os = "android"))))]
const EMSGSIZE: Option<i32> = Some(40);
#[cfg(not(any(unix, windows)))]
const EMSGSIZE: Option<i32> = None;
