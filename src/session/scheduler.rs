//! Retry and timeout scheduling.
//!
//! Every transmission arms a one-shot timer tagged with the request ID and a
//! generation number. A timer whose generation no longer matches the
//! request's (because the request was answered and the ID reused, or a newer
//! timer was armed) is stale and does nothing when it fires.

use std::net::SocketAddr;
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio_util::time::DelayQueue;

use super::pending::{PendingRequest, PendingTable};
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerTag {
    pub(crate) id: i32,
    pub(crate) generation: u64,
}

/// What the dispatcher must do after a timer fired.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// The timer no longer applies.
    Stale,
    /// The caller stopped waiting; the request was dropped without a resend.
    Abandoned,
    /// Send `payload` to `target` again as transmission number `attempt`.
    /// The next timer is already armed.
    Resend {
        target: SocketAddr,
        payload: Bytes,
        attempt: u32,
    },
    /// Retries are exhausted; the caller got [`Error::Timeout`].
    TimedOut,
}

pub(crate) struct Scheduler {
    queue: DelayQueue<TimerTag>,
    next_generation: u64,
}

impl Scheduler {
    pub(crate) fn new() -> Self {
        Self {
            queue: DelayQueue::new(),
            next_generation: 0,
        }
    }

    /// Arm a timer for the request's next transmission.
    pub(crate) fn arm(&mut self, id: i32, request: &mut PendingRequest) {
        self.next_generation += 1;
        request.generation = self.next_generation;
        self.queue.insert(
            TimerTag {
                id,
                generation: request.generation,
            },
            request.timeout,
        );
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Poll for the next expired timer. Returns `Ready(None)` when nothing
    /// is armed, so callers should check [`is_empty`](Self::is_empty) first.
    pub(crate) fn poll_expired(&mut self, cx: &mut Context<'_>) -> Poll<Option<TimerTag>> {
        self.queue
            .poll_expired(cx)
            .map(|expired| expired.map(|e| e.into_inner()))
    }

    /// Apply a fired timer to the table.
    pub(crate) fn fire(&mut self, table: &mut PendingTable, tag: TimerTag) -> Expiry {
        let Some(request) = table.get_mut(tag.id) else {
            return Expiry::Stale;
        };
        if request.generation != tag.generation {
            return Expiry::Stale;
        }

        if request.is_abandoned() {
            table.remove(tag.id);
            return Expiry::Abandoned;
        }

        if request.retries_left > 0 {
            request.retries_left -= 1;
            request.transmissions += 1;
            self.arm(tag.id, request);
            return Expiry::Resend {
                target: request.target,
                payload: request.payload.clone(),
                attempt: request.transmissions,
            };
        }

        let Some(request) = table.remove(tag.id) else {
            return Expiry::Stale;
        };
        let error = Error::Timeout {
            target: Some(request.target),
            elapsed: request.started.elapsed(),
            request_id: tag.id,
            retries: request.retries,
        };
        request.resolve(Err(error));
        Expiry::TimedOut
    }
}
