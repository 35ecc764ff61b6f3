//! In-memory transport for tests.
//!
//! [`MockTransport`] records every datagram the session sends and lets the
//! test decide what comes back: a responder closure that answers requests
//! synchronously, datagrams injected by hand, or receive errors.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;

use super::Transport;
use crate::codec::{BerCodec, Codec};
use crate::message::Message;
use crate::oid_table::OidTable;
use crate::value::Value;

type Responder = Box<dyn FnMut(&Message) -> Option<Message> + Send>;
type Inbound = io::Result<(Bytes, SocketAddr)>;

/// Mock transport. Clones share state, so a test keeps one clone and hands
/// another to the session.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    local_addr: SocketAddr,
    sent: Mutex<Vec<(Bytes, SocketAddr)>>,
    responder: Mutex<Option<Responder>>,
    failing_sends: AtomicUsize,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Inbound>>,
}

impl MockTransport {
    /// Create a mock bound to `127.0.0.1:50000` that never answers.
    pub fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockInner {
                local_addr: SocketAddr::from(([127, 0, 0, 1], 50000)),
                sent: Mutex::new(Vec::new()),
                responder: Mutex::new(None),
                failing_sends: AtomicUsize::new(0),
                inbound_tx,
                inbound_rx: tokio::sync::Mutex::new(inbound_rx),
            }),
        }
    }

    /// Answer every decodable datagram with `f`. Returning `None` drops the
    /// request, which is how tests simulate packet loss.
    pub fn respond_with<F>(&self, f: F)
    where
        F: FnMut(&Message) -> Option<Message> + Send + 'static,
    {
        *self.inner.responder.lock().unwrap() = Some(Box::new(f));
    }

    /// Answer confirmed requests from `table`, the way an agent would.
    pub fn respond_from_table(&self, mut table: OidTable<Value>) {
        self.respond_with(move |request| {
            if !request.pdu.pdu_type.is_confirmed() {
                return None;
            }
            let pdu = table.answer(request.version, &request.pdu);
            Some(Message::new(request.version, request.security.clone(), pdu))
        });
    }

    /// Deliver a raw datagram as if it arrived from `source`.
    pub fn inject(&self, data: impl Into<Bytes>, source: SocketAddr) {
        let _ = self.inner.inbound_tx.send(Ok((data.into(), source)));
    }

    /// Deliver an encoded message as if it arrived from `source`.
    pub fn inject_message(&self, message: &Message, source: SocketAddr) {
        self.inject(BerCodec.encode(message), source);
    }

    /// Make the next receive fail with `error`.
    pub fn inject_error(&self, error: io::Error) {
        let _ = self.inner.inbound_tx.send(Err(error));
    }

    /// Make the next `count` sends fail.
    pub fn fail_sends(&self, count: usize) {
        self.inner.failing_sends.store(count, Ordering::SeqCst);
    }

    /// Every datagram sent so far, in order.
    pub fn sent(&self) -> Vec<(Bytes, SocketAddr)> {
        self.inner.sent.lock().unwrap().clone()
    }

    /// Number of datagrams sent so far.
    pub fn sent_count(&self) -> usize {
        self.inner.sent.lock().unwrap().len()
    }

    /// Sent datagrams that decode as messages.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent()
            .into_iter()
            .filter_map(|(data, _)| BerCodec.decode(data).ok())
            .collect()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for MockTransport {
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> io::Result<()> {
        let failing = self
            .inner
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "mock send failure",
            ));
        }

        let data = Bytes::copy_from_slice(data);
        self.inner.sent.lock().unwrap().push((data.clone(), target));

        let reply = {
            let mut responder = self.inner.responder.lock().unwrap();
            match (responder.as_mut(), BerCodec.decode(data)) {
                (Some(respond), Ok(request)) => respond(&request),
                _ => None,
            }
        };
        if let Some(reply) = reply {
            self.inject_message(&reply, target);
        }
        Ok(())
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        let mut rx = self.inner.inbound_rx.lock().await;
        match rx.recv().await {
            Some(Ok((data, source))) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok((len, source))
            }
            Some(Err(e)) => Err(e),
            // The sender lives in `inner`, so the channel outlives every receiver.
            None => std::future::pending().await,
        }
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::{Pdu, PduType};
    use crate::varbind::VarBind;
    use crate::version::Version;

    fn target() -> SocketAddr {
        "192.0.2.1:161".parse().unwrap()
    }

    #[tokio::test]
    async fn test_table_responder_answers_get() {
        let mock = MockTransport::new();
        mock.respond_from_table(
            [(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("core-1"))]
                .into_iter()
                .collect(),
        );

        let request = Message::community(
            Version::V2c,
            "public",
            Pdu::new(
                PduType::GetRequest,
                42,
                vec![VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0))],
            ),
        );
        mock.send_to(&request.encode(), target()).await.unwrap();

        let mut buf = [0u8; 1500];
        let (len, source) = mock.recv_from(&mut buf).await.unwrap();
        assert_eq!(source, target());
        let reply = Message::decode(Bytes::copy_from_slice(&buf[..len])).unwrap();
        assert_eq!(reply.pdu.request_id, 42);
        assert_eq!(reply.pdu.varbinds[0].value, Value::from("core-1"));
        assert_eq!(mock.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_fail_sends_counts_down() {
        let mock = MockTransport::new();
        mock.fail_sends(1);
        assert!(mock.send_to(b"x", target()).await.is_err());
        assert!(mock.send_to(b"x", target()).await.is_ok());
        assert_eq!(mock.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_error_is_received() {
        let mock = MockTransport::new();
        mock.inject_error(io::Error::other("boom"));
        let mut buf = [0u8; 16];
        assert!(mock.recv_from(&mut buf).await.is_err());
    }
}
