//! Walk stream.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use futures_core::Stream;

use super::Session;
use crate::error::{Error, Result};
use crate::message::Message;
use crate::oid::Oid;

type PendingStep = Pin<Box<dyn Future<Output = Result<Message>> + Send>>;

/// Async stream walking the agent's MIB view with GETNEXT.
///
/// Created by [`Session::walk()`] and [`Session::walk_subtree()`]. Yields
/// one reply message per step and keeps at most one request in flight.
///
/// The walk ends when the agent answers `noSuchName` (SNMPv1), when the
/// last varbind of a reply is `endOfMibView` or the reply has no varbinds,
/// or (for subtree walks) when the reply leaves the subtree. A request error
/// is yielded once and ends the walk. So does an agent returning an OID that
/// does not increase ([`Error::NonIncreasingOid`]).
pub struct Walk {
    session: Session,
    current: Oid,
    subtree: Option<Oid>,
    control: WalkControl,
    done: bool,
    pending: Option<PendingStep>,
}

impl Walk {
    pub(crate) fn new(session: Session, start: Oid, subtree: Option<Oid>) -> Self {
        Self {
            session,
            current: start,
            subtree,
            control: WalkControl::default(),
            done: false,
            pending: None,
        }
    }

    /// Handle for pausing, resuming or cancelling this walk from elsewhere.
    pub fn control(&self) -> WalkControl {
        self.control.clone()
    }

    /// OID the next step asks for the successor of.
    pub fn current(&self) -> &Oid {
        &self.current
    }

    fn finish(&mut self) -> Poll<Option<Result<Message>>> {
        self.done = true;
        self.pending = None;
        Poll::Ready(None)
    }

    /// Decide what a reply means for the walk.
    fn step(&mut self, reply: Message) -> Poll<Option<Result<Message>>> {
        if reply.pdu.is_no_such_name() {
            return self.finish();
        }

        let Some(last) = reply.pdu.varbinds.last() else {
            return self.finish();
        };
        if last.is_end_of_mib_view() {
            return self.finish();
        }
        if let Some(subtree) = &self.subtree
            && !last.oid.starts_with(subtree)
        {
            return self.finish();
        }

        // A non-conformant agent could otherwise keep the walk looping forever.
        if last.oid <= self.current {
            let error = Error::NonIncreasingOid {
                previous: self.current.clone(),
                current: last.oid.clone(),
            };
            self.done = true;
            return Poll::Ready(Some(Err(error)));
        }

        self.current = last.oid.clone();
        Poll::Ready(Some(Ok(reply)))
    }
}

impl Stream for Walk {
    type Item = Result<Message>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        // Must precede the flag reads: control calls wake whatever is registered.
        self.control.register(cx.waker());
        if self.control.is_cancelled() {
            return self.finish();
        }
        if self.control.is_paused() {
            // The reply to a request in flight is discarded; resuming asks again.
            self.pending = None;
            return Poll::Pending;
        }

        if self.pending.is_none() {
            let session = self.session.clone();
            let oid = self.current.clone();
            self.pending = Some(Box::pin(async move { session.get_next(&oid).await }));
        }

        let Some(pending) = self.pending.as_mut() else {
            return Poll::Pending;
        };
        let result = match pending.as_mut().poll(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(result) => result,
        };
        self.pending = None;

        match result {
            Ok(reply) => self.step(reply),
            Err(error) => {
                self.done = true;
                Poll::Ready(Some(Err(error)))
            }
        }
    }
}

/// Cooperative control over a [`Walk`].
///
/// Pausing and cancelling wake a consumer waiting on the walk. A request
/// already in flight is abandoned, its reply ignored and its retransmissions
/// stopped. Resuming re-issues the request for the same OID. Cancelling ends
/// the walk for good.
#[derive(Clone, Default)]
pub struct WalkControl {
    inner: Arc<ControlInner>,
}

#[derive(Default)]
struct ControlInner {
    paused: AtomicBool,
    cancelled: AtomicBool,
    waker: Mutex<Option<Waker>>,
}

impl WalkControl {
    /// Stop issuing requests until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        self.wake();
    }

    /// Continue a paused walk.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        self.wake();
    }

    /// End the walk. The stream yields `None` on its next poll.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.wake();
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    fn register(&self, waker: &Waker) {
        let mut slot = self.inner.waker.lock().unwrap();
        match slot.as_ref() {
            Some(existing) if existing.will_wake(waker) => {}
            _ => *slot = Some(waker.clone()),
        }
    }

    fn wake(&self) {
        if let Some(waker) = self.inner.waker.lock().unwrap().take() {
            waker.wake();
        }
    }
}

impl std::fmt::Debug for WalkControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalkControl")
            .field("paused", &self.is_paused())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
