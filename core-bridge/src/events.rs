//! # Lifecycle Events
//!
//! Broadcast bus for call and shared-resource lifecycle events, built on
//! `tokio::sync::broadcast`.
//!
//! Publishing never blocks and never fails a call: with no subscribers the
//! event is simply dropped. Slow subscribers receive `RecvError::Lagged`
//! and can keep reading.
//!
//! ```text
//! Bridge ──── Call(Started | Settled | Released) ────┐
//!                                                    ├──> EventBus ──> EventStream
//! SharedResource ── Resource(Acquired | Released | TimedOut)
//! ```
//!
//! Within a single resource, `Acquired` and `Released` strictly alternate:
//! the guard publishes `Released` before giving up the lock.

use std::fmt;

use core_async::sync::broadcast::{self, error::RecvError, error::SendError, Receiver};
use serde::Serialize;

use crate::registry::{Handle, Outcome};

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum BridgeEvent {
    Call(CallEvent),
    Resource(ResourceEvent),
}

impl BridgeEvent {
    pub fn description(&self) -> &str {
        match self {
            BridgeEvent::Call(event) => event.description(),
            BridgeEvent::Resource(event) => event.description(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CallEvent {
    /// A handle was allocated and the operation was scheduled.
    Started { handle: Handle, operation: String },
    /// The call reached its terminal outcome.
    Settled {
        handle: Handle,
        operation: String,
        outcome: Outcome,
    },
    /// The host observed the settlement and the handle left the registry.
    Released { handle: Handle },
}

impl CallEvent {
    pub fn description(&self) -> &str {
        match self {
            CallEvent::Started { .. } => "Call started",
            CallEvent::Settled { .. } => "Call settled",
            CallEvent::Released { .. } => "Handle released",
        }
    }

    pub fn handle(&self) -> Handle {
        match self {
            CallEvent::Started { handle, .. }
            | CallEvent::Settled { handle, .. }
            | CallEvent::Released { handle } => *handle,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ResourceEvent {
    Acquired {
        resource: String,
        holder: Option<Handle>,
    },
    Released {
        resource: String,
        holder: Option<Handle>,
        held_for_ms: u64,
    },
    TimedOut {
        resource: String,
        waiter: Option<Handle>,
        waited_ms: u64,
    },
}

impl ResourceEvent {
    pub fn description(&self) -> &str {
        match self {
            ResourceEvent::Acquired { .. } => "Resource acquired",
            ResourceEvent::Released { .. } => "Resource released",
            ResourceEvent::TimedOut { .. } => "Resource acquisition timed out",
        }
    }
}

/// Central broadcast channel for [`BridgeEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BridgeEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it, or an error if
    /// there are none. Bridge internals ignore that error.
    pub fn emit(&self, event: BridgeEvent) -> Result<usize, SendError<BridgeEvent>> {
        self.sender.send(event)
    }

    /// Subscribes to all future events. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<BridgeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(core_runtime::config::DEFAULT_EVENT_CAPACITY)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&BridgeEvent) -> bool + Send + Sync>;

/// Receiver wrapper with optional filtering.
pub struct EventStream {
    receiver: Receiver<BridgeEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<BridgeEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by [`recv`](Self::recv)
    /// and [`try_recv`](Self::try_recv).
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&BridgeEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &BridgeEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` if the subscriber fell behind by `n` events,
    /// `RecvError::Closed` once every bus handle is dropped.
    pub async fn recv(&mut self) -> Result<BridgeEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive; `None` when nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<BridgeEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Some(Err(RecvError::Closed))
                }
            }
        }
    }

    /// Drains everything currently buffered, skipping lag notifications.
    pub fn drain(&mut self) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Some(next) = self.try_recv() {
            match next {
                Ok(event) => events.push(event),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
        events
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HandleCategory, HandleRegistry};

    fn started(registry: &HandleRegistry, operation: &str) -> BridgeEvent {
        BridgeEvent::Call(CallEvent::Started {
            handle: registry.allocate(HandleCategory::Native),
            operation: operation.to_string(),
        })
    }

    #[core_async::test]
    async fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(4);
        let registry = HandleRegistry::new();
        assert!(bus.emit(started(&registry, "sleep")).is_err());
    }

    #[core_async::test]
    async fn test_subscribers_receive_same_event() {
        let bus = EventBus::new(4);
        let registry = HandleRegistry::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        let event = started(&registry, "sayAfter");
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[core_async::test]
    async fn test_stream_filter_skips_call_events() {
        let bus = EventBus::new(8);
        let registry = HandleRegistry::new();
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, BridgeEvent::Resource(_)));

        bus.emit(started(&registry, "useSharedResource")).ok();
        let acquired = BridgeEvent::Resource(ResourceEvent::Acquired {
            resource: "shared".to_string(),
            holder: None,
        });
        bus.emit(acquired.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), acquired);
        assert!(stream.try_recv().is_none());
    }

    #[core_async::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let registry = HandleRegistry::new();
        let mut receiver = bus.subscribe();

        for _ in 0..5 {
            bus.emit(started(&registry, "void")).ok();
        }

        assert!(matches!(receiver.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_drain_collects_buffered_events() {
        let bus = EventBus::new(8);
        let registry = HandleRegistry::new();
        let mut stream = EventStream::new(bus.subscribe());

        for name in ["alwaysReady", "void", "sleep"] {
            bus.emit(started(&registry, name)).ok();
        }

        let drained = stream.drain();
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].description(), "Call started");
    }

    #[test]
    fn test_event_serialization() {
        let registry = HandleRegistry::new();
        let handle = registry.allocate(HandleCategory::Foreign);
        let event = BridgeEvent::Call(CallEvent::Settled {
            handle,
            operation: "sayAfterWithHost".to_string(),
            outcome: Outcome::Cancelled,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Call");
        assert_eq!(json["payload"]["event"], "Settled");
        assert_eq!(json["payload"]["outcome"], "cancelled");
        assert_eq!(json["payload"]["handle"]["category"], "foreign");
    }
}
