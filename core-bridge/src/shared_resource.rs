//! # Shared Resource Guard
//!
//! A timed mutex used by concurrent bridged calls. At most one call holds
//! the resource; others wait up to their own timeout and then fail with
//! [`TimeoutError`].
//!
//! The guard is an owned lock permit, so it is released by whatever ends
//! the holder's scope: normal completion, an early return, or the native
//! future being dropped by the cancellation relay.
//!
//! Waiters are queued in arrival order, but each waiter's deadline is its
//! own: a waiter that times out leaves the queue without affecting the
//! others. When the resource is released at the same instant a waiter's
//! deadline expires, the waiter acquires it.

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard, PoisonError};

use core_async::sync::{Mutex, OwnedMutexGuard};
use core_async::time::{self, Duration, Instant};
use core_runtime::config::ResourceOptions;
use thiserror::Error;
use tracing::debug;

use crate::context::current_call;
use crate::events::{BridgeEvent, EventBus, ResourceEvent};
use crate::registry::Handle;
use crate::translator::{ErrorKind, NativeError};

/// Acquisition deadline expired while the resource was held.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Resource '{resource}' was not acquired within {waited_ms}ms")]
pub struct TimeoutError {
    pub resource: String,
    pub waited_ms: u64,
}

impl NativeError for TimeoutError {
    fn type_name(&self) -> &'static str {
        "TimeoutError"
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::Timeout
    }
}

#[derive(Debug, Default)]
struct Occupancy {
    held: bool,
    holder: Option<Handle>,
}

struct ResourceInner {
    name: String,
    lock: Arc<Mutex<()>>,
    occupancy: StdMutex<Occupancy>,
    events: Option<EventBus>,
}

/// A named resource shared by contending calls. Cheap to clone.
#[derive(Clone)]
pub struct SharedResource {
    inner: Arc<ResourceInner>,
}

impl SharedResource {
    pub fn new(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    /// Like [`new`](Self::new), publishing resource events on `events`.
    pub fn with_events(name: impl Into<String>, events: EventBus) -> Self {
        Self::build(name.into(), Some(events))
    }

    fn build(name: String, events: Option<EventBus>) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                name,
                lock: Arc::new(Mutex::new(())),
                occupancy: StdMutex::new(Occupancy::default()),
                events,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    fn occupancy(&self) -> StdMutexGuard<'_, Occupancy> {
        self.inner
            .occupancy
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ResourceEvent) {
        if let Some(events) = &self.inner.events {
            let _ = events.emit(BridgeEvent::Resource(event));
        }
    }

    pub fn is_held(&self) -> bool {
        self.occupancy().held
    }

    /// Call currently holding the resource, if it is held from inside a
    /// bridged operation.
    pub fn holder(&self) -> Option<Handle> {
        self.occupancy().holder
    }

    /// Waits up to `timeout` for the resource.
    ///
    /// A free resource is acquired immediately, even with a zero timeout.
    pub async fn acquire(&self, timeout: Duration) -> Result<SharedResourceGuard, TimeoutError> {
        let waiter = current_call();
        let started = Instant::now();

        match time::timeout(timeout, self.inner.lock.clone().lock_owned()).await {
            Ok(permit) => {
                {
                    let mut occupancy = self.occupancy();
                    occupancy.held = true;
                    occupancy.holder = waiter;
                }
                debug!(resource = %self.inner.name, holder = ?waiter, "resource acquired");
                self.emit(ResourceEvent::Acquired {
                    resource: self.inner.name.clone(),
                    holder: waiter,
                });

                Ok(SharedResourceGuard {
                    resource: self.clone(),
                    holder: waiter,
                    acquired_at: Instant::now(),
                    permit: Some(permit),
                })
            }
            Err(_) => {
                let waited_ms = time::elapsed_millis(started);
                debug!(resource = %self.inner.name, waiter = ?waiter, waited_ms, "resource wait timed out");
                self.emit(ResourceEvent::TimedOut {
                    resource: self.inner.name.clone(),
                    waiter,
                    waited_ms,
                });

                Err(TimeoutError {
                    resource: self.inner.name.clone(),
                    waited_ms: timeout.as_millis().min(u64::MAX as u128) as u64,
                })
            }
        }
    }

    /// Acquires with `options.timeout_ms`, then holds for
    /// `options.release_after_ms`.
    pub async fn hold(&self, options: ResourceOptions) -> Result<(), TimeoutError> {
        let guard = self.acquire(options.timeout()).await?;
        time::sleep(options.release_after()).await;
        drop(guard);
        Ok(())
    }
}

impl fmt::Debug for SharedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let occupancy = self.occupancy();
        f.debug_struct("SharedResource")
            .field("name", &self.inner.name)
            .field("held", &occupancy.held)
            .field("holder", &occupancy.holder)
            .finish()
    }
}

/// Exclusive hold on a [`SharedResource`]; released on drop.
#[must_use = "the resource is released as soon as the guard is dropped"]
pub struct SharedResourceGuard {
    resource: SharedResource,
    holder: Option<Handle>,
    acquired_at: Instant,
    permit: Option<OwnedMutexGuard<()>>,
}

impl SharedResourceGuard {
    pub fn holder(&self) -> Option<Handle> {
        self.holder
    }

    pub fn held_for(&self) -> Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for SharedResourceGuard {
    fn drop(&mut self) {
        let held_for_ms = time::elapsed_millis(self.acquired_at);
        {
            let mut occupancy = self.resource.occupancy();
            occupancy.held = false;
            occupancy.holder = None;
        }
        debug!(resource = %self.resource.inner.name, holder = ?self.holder, held_for_ms, "resource released");
        self.resource.emit(ResourceEvent::Released {
            resource: self.resource.inner.name.clone(),
            holder: self.holder,
            held_for_ms,
        });

        // Unlock last so the next holder never observes stale occupancy.
        self.permit.take();
    }
}

impl fmt::Debug for SharedResourceGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedResourceGuard")
            .field("resource", &self.resource.inner.name)
            .field("holder", &self.holder)
            .finish()
    }
}
