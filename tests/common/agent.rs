//! Minimal SNMP agent on a loopback UDP socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use snmp_session::codec::{BerCodec, Codec};
use snmp_session::oid_table::OidTable;
use snmp_session::{Message, Value};
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

/// Answers confirmed requests from an [`OidTable`]. Stops when dropped.
pub struct TestAgent {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl TestAgent {
    pub async fn start(table: OidTable<Value>) -> Self {
        Self::start_dropping(table, 0).await
    }

    /// Like [`start`](Self::start), but ignores the first `drop_first`
    /// requests to simulate packet loss.
    pub async fn start_dropping(mut table: OidTable<Value>, drop_first: usize) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let seen = requests.clone();

        let task = tokio::spawn(async move {
            let mut buf = vec![0u8; 65535];
            loop {
                let Ok((len, source)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let Ok(request) = BerCodec.decode(Bytes::copy_from_slice(&buf[..len])) else {
                    continue;
                };
                if !request.pdu.pdu_type.is_confirmed() {
                    continue;
                }
                if seen.fetch_add(1, Ordering::SeqCst) < drop_first {
                    continue;
                }

                let pdu = table.answer(request.version, &request.pdu);
                let reply = Message::new(request.version, request.security.clone(), pdu);
                let _ = socket.send_to(&BerCodec.encode(&reply), source).await;
            }
        });

        Self {
            addr,
            requests,
            task,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Confirmed requests received so far, dropped ones included.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for TestAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}
