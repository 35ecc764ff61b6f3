//! Pending request table.
//!
//! Maps request IDs to in-flight requests. Owned by the session dispatcher,
//! which is the only code that touches it, so there is no lock.
//!
//! Every path that takes an entry out of the table also fires its sink, so
//! a caller is resolved exactly once and never sees a request that is still
//! registered.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::message::Message;

/// Where the dispatcher delivers a request's outcome.
pub(crate) type Sink = oneshot::Sender<Result<Message>>;

/// A request that has been sent and is waiting for its reply.
pub(crate) struct PendingRequest {
    pub(crate) target: SocketAddr,
    /// Encoded message, resent unchanged on retry.
    pub(crate) payload: Bytes,
    pub(crate) retries: u32,
    pub(crate) retries_left: u32,
    pub(crate) timeout: Duration,
    pub(crate) sink: Sink,
    /// Generation of the timer currently armed for this request.
    pub(crate) generation: u64,
    pub(crate) transmissions: u32,
    pub(crate) started: Instant,
}

impl PendingRequest {
    pub(crate) fn new(
        target: SocketAddr,
        payload: Bytes,
        retries: u32,
        timeout: Duration,
        sink: Sink,
    ) -> Self {
        Self {
            target,
            payload,
            retries,
            retries_left: retries,
            timeout,
            sink,
            generation: 0,
            transmissions: 1,
            started: Instant::now(),
        }
    }

    /// The caller stopped waiting.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.sink.is_closed()
    }

    /// Fire the sink. The caller may already be gone.
    pub(crate) fn resolve(self, outcome: Result<Message>) {
        let _ = self.sink.send(outcome);
    }
}

#[derive(Default)]
pub(crate) struct PendingTable {
    entries: HashMap<i32, PendingRequest>,
}

impl PendingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a request under `id`. The ID must not be pending.
    pub(crate) fn register(&mut self, id: i32, request: PendingRequest) {
        let previous = self.entries.insert(id, request);
        debug_assert!(previous.is_none(), "request id {id} registered twice");
    }

    /// Resolve the request `id` with `message`. Returns false when no such
    /// request is pending.
    pub(crate) fn complete(&mut self, id: i32, message: Message) -> bool {
        match self.entries.remove(&id) {
            Some(request) => {
                request.resolve(Ok(message));
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove(&mut self, id: i32) -> Option<PendingRequest> {
        self.entries.remove(&id)
    }

    /// Fail every pending request with the error `f` builds for it and
    /// empty the table. Returns the number of requests failed.
    pub(crate) fn fail_all(&mut self, mut f: impl FnMut(i32, &PendingRequest) -> Error) -> usize {
        let count = self.entries.len();
        for (id, request) in self.entries.drain() {
            let error = f(id, &request);
            request.resolve(Err(error));
        }
        count
    }

    pub(crate) fn get(&self, id: i32) -> Option<&PendingRequest> {
        self.entries.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: i32) -> Option<&mut PendingRequest> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn contains(&self, id: i32) -> bool {
        self.entries.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
