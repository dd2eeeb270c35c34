//! # Future Bridge
//!
//! [`Bridge`] owns the native multi-threaded runtime and turns native async
//! operations into host-observable [`Deferred`] values.
//!
//! ```text
//! host ── call(op, options, future) ──> allocate handle ──> spawn driver on native runtime
//!                                                               │
//!   Deferred <── oneshot (wakes the host task) <── settle ◄─────┘
//! ```
//!
//! Each call:
//! 1. allocates a native handle and publishes `CallEvent::Started`,
//! 2. runs the operation under its [`CancellationRelay`], with the call's
//!    handle available through [`current_call`](crate::context::current_call),
//! 3. settles exactly once: value, translated error, cancellation or panic,
//! 4. releases the handle once the host has observed the settlement.
//!
//! Calls are never cached or coalesced; bridging the same operation twice
//! yields two handles.
//!
//! ## Usage
//!
//! ```ignore
//! let bridge = Bridge::new(BridgeConfig::default())?;
//! let answer = bridge
//!     .call(Operation::function("fallibleMe"), CallOptions::none(), async { Ok::<_, MyError>(42) })
//!     .await?;
//! ```

use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, Location};
use std::sync::Arc;

use bridge_traits::host::HostDispatcher;
use core_async::runtime::{self, Runtime};
use core_async::sync::oneshot;
use core_runtime::config::BridgeConfig;
use core_runtime::logging::init_logging;
use futures::FutureExt;
use tracing::{debug, debug_span, info, Instrument};

use crate::cancel::{AbortSignal, CancellationRelay};
use crate::context;
use crate::deferred::{CallSlot, Deferred};
use crate::error::Result;
use crate::events::{EventBus, EventStream};
use crate::operation::Operation;
use crate::registry::{HandleCategory, HandleRegistry};
use crate::translator::{HostError, NativeError};

/// Per-call options supplied by the host.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub signal: Option<AbortSignal>,
}

impl CallOptions {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_signal(signal: AbortSignal) -> Self {
        Self {
            signal: Some(signal),
        }
    }
}

impl From<Option<AbortSignal>> for CallOptions {
    fn from(signal: Option<AbortSignal>) -> Self {
        Self { signal }
    }
}

struct NativeRuntime {
    runtime: Option<Runtime>,
}

impl NativeRuntime {
    fn start(config: &BridgeConfig) -> Result<Self> {
        let runtime = runtime::multi_thread(config.worker_threads, &config.thread_name)?;
        info!(
            workers = config.worker_threads,
            thread_name = %config.thread_name,
            "native runtime started"
        );
        Ok(Self {
            runtime: Some(runtime),
        })
    }

    fn handle(&self) -> Option<&runtime::Handle> {
        self.runtime.as_ref().map(Runtime::handle)
    }
}

impl Drop for NativeRuntime {
    fn drop(&mut self) {
        // May run on the host loop, where a blocking shutdown would panic.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
            debug!("native runtime shut down");
        }
    }
}

struct BridgeInner {
    runtime: NativeRuntime,
    registry: Arc<HandleRegistry>,
    events: EventBus,
    host: Option<Arc<dyn HostDispatcher>>,
    config: BridgeConfig,
}

/// Entry point for bridged calls. Cheap to clone.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

/// Builder for [`Bridge`].
pub struct BridgeBuilder {
    config: BridgeConfig,
    registry: Option<Arc<HandleRegistry>>,
    events: Option<EventBus>,
    host: Option<Arc<dyn HostDispatcher>>,
}

impl BridgeBuilder {
    /// Registry to account handles in; defaults to [`HandleRegistry::global`].
    pub fn registry(mut self, registry: Arc<HandleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Host loop used for foreign calls.
    pub fn host(mut self, host: Arc<dyn HostDispatcher>) -> Self {
        self.host = Some(host);
        self
    }

    /// Validates the configuration, installs logging if configured, and
    /// starts the native runtime.
    pub fn build(self) -> Result<Bridge> {
        self.config.validate()?;
        if let Some(logging) = self.config.logging.clone() {
            init_logging(logging)?;
        }

        let runtime = NativeRuntime::start(&self.config)?;
        let events = self
            .events
            .unwrap_or_else(|| EventBus::new(self.config.event_capacity));

        Ok(Bridge {
            inner: Arc::new(BridgeInner {
                runtime,
                registry: self.registry.unwrap_or_else(HandleRegistry::global),
                events,
                host: self.host,
                config: self.config,
            }),
        })
    }
}

impl Bridge {
    pub fn builder(config: BridgeConfig) -> BridgeBuilder {
        BridgeBuilder {
            config,
            registry: None,
            events: None,
            host: None,
        }
    }

    pub fn new(config: BridgeConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.inner.registry
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.inner.events.subscribe())
    }

    pub fn host(&self) -> Option<&Arc<dyn HostDispatcher>> {
        self.inner.host.as_ref()
    }

    /// Live handles of `category` in this bridge's registry.
    pub fn live_handles(&self, category: HandleCategory) -> usize {
        self.inner.registry.count(category)
    }

    fn slot(&self, category: HandleCategory, operation: Operation) -> Arc<CallSlot> {
        CallSlot::open(
            category,
            self.inner.registry.clone(),
            operation,
            self.inner.events.clone(),
        )
    }

    /// Bridges a fallible native operation.
    ///
    /// The future starts on the native runtime immediately; the returned
    /// [`Deferred`] only observes it. If `options.signal` is already aborted
    /// the future is dropped unpolled and the call rejects as cancelled.
    #[track_caller]
    pub fn call<F, T, E>(
        &self,
        operation: Operation,
        options: CallOptions,
        future: F,
    ) -> Deferred<T>
    where
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: NativeError,
    {
        let call_site = Location::caller();
        let slot = self.slot(HandleCategory::Native, operation);
        let handle = slot.handle();
        let (sender, receiver) = oneshot::channel();
        let deferred = Deferred::new(slot.clone(), operation, call_site, receiver);

        let relay = CancellationRelay::new(options.signal.as_ref());
        let Some(runtime) = self.inner.runtime.handle().filter(|_| !relay.is_fired()) else {
            debug!(%handle, %operation, "call cancelled before start");
            drop(future);
            slot.finish(sender, Err(HostError::aborted(&operation, call_site)));
            return deferred;
        };

        let span = debug_span!("bridged_call", %handle, %operation);
        runtime.spawn(
            async move {
                let guarded = AssertUnwindSafe(future).catch_unwind();
                let result = match relay.run(context::scope(handle, guarded)).await {
                    None => Err(HostError::aborted(&operation, call_site)),
                    Some(Ok(Ok(value))) => Ok(value),
                    Some(Ok(Err(error))) => Err(HostError::translate(error, &operation, call_site)),
                    Some(Err(payload)) => Err(HostError::panicked(&operation, call_site, payload)),
                };
                slot.finish(sender, result);
            }
            .instrument(span),
        );

        deferred
    }

    /// Bridges a native operation that cannot fail.
    #[track_caller]
    pub fn call_infallible<F, T>(
        &self,
        operation: Operation,
        options: CallOptions,
        future: F,
    ) -> Deferred<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.call(operation, options, future.map(Ok::<T, Infallible>))
    }

    pub(crate) fn foreign_slot(&self, operation: Operation) -> Arc<CallSlot> {
        self.slot(HandleCategory::Foreign, operation)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.inner.registry)
            .field("events", &self.inner.events)
            .field("has_host", &self.inner.host.is_some())
            .field("worker_threads", &self.inner.config.worker_threads)
            .finish()
    }
}
