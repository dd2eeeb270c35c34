//! Deferred values and per-call bookkeeping.
//!
//! A [`Deferred`] is the host's view of one bridged call: a future that
//! resolves or rejects exactly once. Its twin on the native side is a
//! `oneshot::Sender` held by the task driving the operation.
//!
//! Both sides share a `CallSlot`. Whichever side drops the last reference
//! releases the handle, so the handle outlives neither the driver nor the
//! host's observation. The driver drops its reference *before* sending the
//! result; when the host sees the settlement, the only reference left is the
//! deferred's own, and the handle is released before `await` returns.

use std::future::Future;
use std::panic::Location;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use core_async::sync::oneshot;
use tracing::{debug, warn};

use crate::events::{BridgeEvent, CallEvent, EventBus};
use crate::operation::Operation;
use crate::registry::{Handle, HandleCategory, HandleRegistry, Outcome};
use crate::translator::HostError;

pub(crate) type Settlement<T> = Result<T, HostError>;

pub(crate) struct CallSlot {
    handle: Handle,
    registry: Arc<HandleRegistry>,
    operation: Operation,
    events: EventBus,
}

impl CallSlot {
    pub(crate) fn open(
        category: HandleCategory,
        registry: Arc<HandleRegistry>,
        operation: Operation,
        events: EventBus,
    ) -> Arc<Self> {
        let handle = registry.allocate(category);
        let _ = events.emit(BridgeEvent::Call(CallEvent::Started {
            handle,
            operation: operation.qualified_name(),
        }));

        Arc::new(Self {
            handle,
            registry,
            operation,
            events,
        })
    }

    pub(crate) fn handle(&self) -> Handle {
        self.handle
    }

    /// Records `outcome` if the call has not settled yet.
    pub(crate) fn settle(&self, outcome: Outcome) -> bool {
        match self.registry.settle(self.handle, outcome) {
            Ok(true) => {
                debug!(
                    handle = %self.handle,
                    operation = %self.operation,
                    outcome = outcome.as_str(),
                    "call settled"
                );
                let _ = self.events.emit(BridgeEvent::Call(CallEvent::Settled {
                    handle: self.handle,
                    operation: self.operation.qualified_name(),
                    outcome,
                }));
                true
            }
            Ok(false) => false,
            Err(error) => {
                warn!(handle = %self.handle, %error, "settlement rejected by registry");
                false
            }
        }
    }

    /// Settles, gives up this reference, then hands `result` to the host.
    pub(crate) fn finish<T>(
        self: Arc<Self>,
        sender: oneshot::Sender<Settlement<T>>,
        result: Settlement<T>,
    ) {
        let outcome = match &result {
            Ok(_) => Outcome::Completed,
            Err(error) if error.is_cancellation() => Outcome::Cancelled,
            Err(_) => Outcome::Failed,
        };
        self.settle(outcome);
        drop(self);

        if sender.send(result).is_err() {
            debug!("deferred value dropped before settlement was observed");
        }
    }
}

impl Drop for CallSlot {
    fn drop(&mut self) {
        // Nobody settled: the call was abandoned mid-flight.
        self.settle(Outcome::Cancelled);

        match self.registry.release(self.handle) {
            Ok(_) => {
                let _ = self.events.emit(BridgeEvent::Call(CallEvent::Released {
                    handle: self.handle,
                }));
            }
            Err(error) => warn!(handle = %self.handle, %error, "failed to release handle"),
        }
    }
}

/// Host-observable result of a bridged call.
///
/// Resolves to the operation's value or rejects with a [`HostError`].
/// Dropping it without awaiting does not cancel the operation; use an
/// [`AbortSignal`](crate::cancel::AbortSignal) for that.
#[must_use = "a deferred value settles unobserved unless awaited"]
pub struct Deferred<T> {
    handle: Handle,
    operation: Operation,
    call_site: &'static Location<'static>,
    receiver: oneshot::Receiver<Settlement<T>>,
    slot: Option<Arc<CallSlot>>,
}

impl<T> Deferred<T> {
    pub(crate) fn new(
        slot: Arc<CallSlot>,
        operation: Operation,
        call_site: &'static Location<'static>,
        receiver: oneshot::Receiver<Settlement<T>>,
    ) -> Self {
        Self {
            handle: slot.handle(),
            operation,
            call_site,
            receiver,
            slot: Some(slot),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }
}

impl<T> Future for Deferred<T> {
    type Output = Settlement<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let received = ready!(Pin::new(&mut this.receiver).poll(cx));

        // Observed: this is normally the last reference, releasing the handle.
        this.slot.take();

        Poll::Ready(match received {
            Ok(settlement) => settlement,
            Err(_) => Err(HostError::lost(&this.operation, this.call_site)),
        })
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("handle", &self.handle)
            .field("operation", &self.operation)
            .finish()
    }
}
